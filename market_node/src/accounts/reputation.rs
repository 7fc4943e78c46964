//! Reputation scoring: additive clamped components banded into levels

use super::{AccountProfile, Badge};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReputationLevel {
    Newcomer,
    Regular,
    Trusted,
    Expert,
    Elite,
}

pub fn calculate_level(score: u32) -> ReputationLevel {
    if score >= 90 {
        ReputationLevel::Elite
    } else if score >= 70 {
        ReputationLevel::Expert
    } else if score >= 50 {
        ReputationLevel::Trusted
    } else if score >= 30 {
        ReputationLevel::Regular
    } else {
        ReputationLevel::Newcomer
    }
}

/// Additive score: rental history up to 40, reviews up to 30, activity
/// up to 20, badges up to 10
pub fn calculate_score(profile: &AccountProfile) -> u32 {
    let rental_score = (profile.stats.total_spent * 2.0).min(40.0);
    let review_score = (profile.stats.average_rating * 10.0).min(30.0);
    let activity_score = (profile.activity.len() as f64).min(20.0);
    let badge_score = (profile.badges.len() as f64 * 5.0).min(10.0);
    (rental_score + review_score + activity_score + badge_score).round() as u32
}

pub struct BadgeSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const BADGES: &[BadgeSpec] = &[
    BadgeSpec {
        id: "power-renter",
        name: "Power Renter",
        description: "Completed 10+ successful rentals",
    },
    BadgeSpec {
        id: "top-provider",
        name: "Top Provider",
        description: "Listed 5+ resources with high ratings",
    },
    BadgeSpec {
        id: "trusted-member",
        name: "Trusted Member",
        description: "Reached the Trusted reputation level",
    },
];

fn has_badge(profile: &AccountProfile, id: &str) -> bool {
    profile.badges.iter().any(|b| b.id == id)
}

/// Badges newly earned by the profile's current standing
pub fn earned_badges(profile: &AccountProfile) -> Vec<Badge> {
    let mut earned = Vec::new();

    if profile.reputation.total_rentals >= 10 && !has_badge(profile, "power-renter") {
        earned.push(make_badge("power-renter"));
    }
    if profile.reputation.total_listed >= 5
        && profile.stats.average_rating >= 4.5
        && !has_badge(profile, "top-provider")
    {
        earned.push(make_badge("top-provider"));
    }
    if calculate_level(profile.reputation.score) >= ReputationLevel::Trusted
        && !has_badge(profile, "trusted-member")
    {
        earned.push(make_badge("trusted-member"));
    }

    earned
}

fn make_badge(id: &str) -> Badge {
    let spec = BADGES
        .iter()
        .find(|b| b.id == id)
        .unwrap_or(&BADGES[0]);
    Badge {
        id: spec.id.to_string(),
        name: spec.name.to_string(),
        earned_at: Utc::now(),
    }
}
