//! crates/kova_core/src/dashboard.rs
//!
//! Dashboard figures. Only the connection count is real; the view counts are
//! placeholder analytics seeded from the user id so they stay stable between visits.

use crate::domain::{Match, Profile};
use serde::Serialize;
use uuid::Uuid;

pub const WEEK_DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    FirstConnection,
    FiveConnections,
    SuperConnector,
    ProfileComplete,
    SkillBuilder,
}

impl Badge {
    pub fn title(&self) -> &'static str {
        match self {
            Badge::FirstConnection => "First Connection",
            Badge::FiveConnections => "Networker",
            Badge::SuperConnector => "Super Connector",
            Badge::ProfileComplete => "All Set",
            Badge::SkillBuilder => "Skill Builder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayViews {
    pub day: &'static str,
    pub views: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub weekly_views: Vec<DayViews>,
    pub total_views: u32,
    pub connections: usize,
    /// 0..=100
    pub profile_completion: u8,
    pub badges: Vec<Badge>,
    pub recent_connections: Vec<Profile>,
}

/// Fraction of the optional profile fields that are filled in, as a percentage.
pub fn profile_completion(profile: &Profile) -> u8 {
    let filled = [
        !profile.bio.trim().is_empty(),
        !profile.avatar_url.trim().is_empty(),
        !profile.headline.trim().is_empty(),
        !profile.industry.trim().is_empty(),
        !profile.looking_for.trim().is_empty(),
        !profile.skills.is_empty(),
        !profile.city.trim().is_empty(),
        profile.date_of_birth.is_some(),
    ];
    let done = filled.iter().filter(|f| **f).count();
    (done * 100 / filled.len()) as u8
}

fn weekly_views(user: Uuid) -> Vec<DayViews> {
    let bytes = user.as_bytes();
    WEEK_DAYS
        .iter()
        .enumerate()
        .map(|(i, day)| DayViews {
            day,
            views: 5 + u32::from(bytes[i] ^ bytes[i + 8]) % 40,
        })
        .collect()
}

pub fn earned_badges(profile: &Profile, connections: usize) -> Vec<Badge> {
    let mut badges = Vec::new();
    if connections >= 1 {
        badges.push(Badge::FirstConnection);
    }
    if connections >= 5 {
        badges.push(Badge::FiveConnections);
    }
    if connections >= 10 {
        badges.push(Badge::SuperConnector);
    }
    if profile_completion(profile) == 100 {
        badges.push(Badge::ProfileComplete);
    }
    if profile.skills.len() >= 3 {
        badges.push(Badge::SkillBuilder);
    }
    badges
}

pub fn build(profile: &Profile, matches: &[Match]) -> DashboardStats {
    let weekly_views = weekly_views(profile.id);
    let total_views = weekly_views.iter().map(|d| d.views).sum();
    let mut recent: Vec<&Match> = matches.iter().collect();
    recent.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));

    DashboardStats {
        weekly_views,
        total_views,
        connections: matches.len(),
        profile_completion: profile_completion(profile),
        badges: earned_badges(profile, matches.len()),
        recent_connections: recent.into_iter().take(3).map(|m| m.partner.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchRecord;
    use crate::testing::profile;
    use chrono::{Duration, Utc};

    fn matched(me: Uuid, partner: Profile, minutes_ago: i64) -> Match {
        Match {
            record: MatchRecord {
                id: Uuid::new_v4(),
                user_a: me,
                user_b: partner.id,
                created_at: Utc::now() - Duration::minutes(minutes_ago),
            },
            partner,
        }
    }

    #[test]
    fn views_are_stable_per_user() {
        let me = profile("Ada");
        let first = build(&me, &[]);
        let second = build(&me, &[]);
        assert_eq!(first.weekly_views, second.weekly_views);
        assert_eq!(first.weekly_views.len(), 7);
        assert!(first.weekly_views.iter().all(|d| (5..45).contains(&d.views)));
    }

    #[test]
    fn badges_follow_connection_thresholds() {
        let me = profile("Ada");
        assert!(earned_badges(&me, 0).is_empty());
        assert_eq!(earned_badges(&me, 1), vec![Badge::FirstConnection]);
        assert_eq!(
            earned_badges(&me, 5),
            vec![Badge::FirstConnection, Badge::FiveConnections]
        );
    }

    #[test]
    fn complete_profile_earns_badge() {
        let mut me = profile("Ada");
        me.bio = "Founder".into();
        me.avatar_url = "https://example.com/a.png".into();
        me.headline = "CEO @ Analytical".into();
        me.industry = "Fintech".into();
        me.looking_for = "Co-founder".into();
        me.skills = vec!["Rust".into(), "Sales".into(), "Design".into()];
        me.date_of_birth = chrono::NaiveDate::from_ymd_opt(1990, 1, 1);
        assert_eq!(profile_completion(&me), 100);
        let badges = earned_badges(&me, 0);
        assert!(badges.contains(&Badge::ProfileComplete));
        assert!(badges.contains(&Badge::SkillBuilder));
    }

    #[test]
    fn recent_connections_are_newest_first() {
        let me = profile("Me");
        let matches = vec![
            matched(me.id, profile("Old"), 60),
            matched(me.id, profile("New"), 1),
            matched(me.id, profile("Mid"), 30),
            matched(me.id, profile("Oldest"), 90),
        ];
        let stats = build(&me, &matches);
        assert_eq!(stats.connections, 4);
        let names: Vec<_> = stats.recent_connections.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["New", "Mid", "Old"]);
    }
}
