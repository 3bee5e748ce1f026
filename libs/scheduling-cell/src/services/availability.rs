use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailabilityRule, CreateRuleRequest, SchedulingError, UpdateRuleRequest};
use crate::services::calendar::CalendarClient;

/// Half-open interval intersection: `[a_start, a_end)` and `[b_start, b_end)`
/// overlap iff each starts before the other ends. Back-to-back windows do not
/// overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Candidate slot starts for one rule: stepped by `slot + gap` minutes while
/// the whole slot still fits before the rule's end.
pub fn generate_rule_slots(rule: &AvailabilityRule) -> Vec<NaiveTime> {
    let mut slots = Vec::new();

    if rule.slot_minutes <= 0 || rule.start_time >= rule.end_time {
        return slots;
    }

    let step = Duration::minutes(rule.slot_minutes + rule.gap_minutes.max(0));
    let slot_len = Duration::minutes(rule.slot_minutes);

    let mut cursor = rule.start_time;
    loop {
        // overflowing_add_signed reports a wrap past midnight as leap seconds
        let (slot_end, wrap) = cursor.overflowing_add_signed(slot_len);
        if wrap != 0 || slot_end > rule.end_time {
            break;
        }
        slots.push(cursor);

        let (next, wrap) = cursor.overflowing_add_signed(step);
        if wrap != 0 || next <= cursor {
            break;
        }
        cursor = next;
    }

    slots
}

pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn list_rules(&self) -> Result<Vec<AvailabilityRule>, SchedulingError> {
        let rules = self
            .supabase
            .select("/rest/v1/availability_rules?select=*&order=day_of_week,start_time")
            .await?;
        Ok(rules)
    }

    async fn active_rules_for_day(
        &self,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityRule>, SchedulingError> {
        let path = format!(
            "/rest/v1/availability_rules?select=*&day_of_week=eq.{}&active=eq.true&order=start_time",
            day_of_week
        );
        let rules = self.supabase.select(&path).await?;
        Ok(rules)
    }

    fn validate_rule_times(start: NaiveTime, end: NaiveTime) -> Result<(), SchedulingError> {
        if start >= end {
            return Err(SchedulingError::InvalidTime(
                "start_time must be before end_time".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject a rule whose window intersects another active rule on the same
    /// weekday. Touching endpoints (end == start) are allowed.
    async fn check_rule_overlap(
        &self,
        day_of_week: i32,
        start: NaiveTime,
        end: NaiveTime,
        exclude_id: Option<Uuid>,
    ) -> Result<(), SchedulingError> {
        let existing = self.active_rules_for_day(day_of_week).await?;

        for rule in existing {
            if Some(rule.id) == exclude_id {
                continue;
            }
            if start < rule.end_time && end > rule.start_time {
                return Err(SchedulingError::RuleOverlap);
            }
        }

        Ok(())
    }

    pub async fn create_rule(
        &self,
        request: CreateRuleRequest,
    ) -> Result<AvailabilityRule, SchedulingError> {
        if !(0..=6).contains(&request.day_of_week) {
            return Err(SchedulingError::InvalidTime(
                "day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }
        Self::validate_rule_times(request.start_time, request.end_time)?;
        if request.slot_minutes <= 0 {
            return Err(SchedulingError::InvalidTime(
                "slot_minutes must be positive".to_string(),
            ));
        }
        if request.gap_minutes < 0 {
            return Err(SchedulingError::InvalidTime(
                "gap_minutes must not be negative".to_string(),
            ));
        }

        self.check_rule_overlap(
            request.day_of_week,
            request.start_time,
            request.end_time,
            None,
        )
        .await?;

        let rule = self
            .supabase
            .insert(
                "availability_rules",
                json!({
                    "day_of_week": request.day_of_week,
                    "start_time": request.start_time,
                    "end_time": request.end_time,
                    "slot_minutes": request.slot_minutes,
                    "gap_minutes": request.gap_minutes,
                    "active": true,
                }),
            )
            .await?;

        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        rule_id: Uuid,
        request: UpdateRuleRequest,
    ) -> Result<AvailabilityRule, SchedulingError> {
        let path = format!("/rest/v1/availability_rules?id=eq.{}&select=*", rule_id);
        let current: AvailabilityRule = self
            .supabase
            .select(&path)
            .await?
            .into_iter()
            .next()
            .ok_or(SchedulingError::NotFound)?;

        let start = request.start_time.unwrap_or(current.start_time);
        let end = request.end_time.unwrap_or(current.end_time);
        let active = request.active.unwrap_or(current.active);

        Self::validate_rule_times(start, end)?;
        if active {
            self.check_rule_overlap(current.day_of_week, start, end, Some(rule_id))
                .await?;
        }

        let mut body = serde_json::Map::new();
        body.insert("start_time".to_string(), json!(start));
        body.insert("end_time".to_string(), json!(end));
        body.insert("active".to_string(), json!(active));
        if let Some(slot_minutes) = request.slot_minutes {
            if slot_minutes <= 0 {
                return Err(SchedulingError::InvalidTime(
                    "slot_minutes must be positive".to_string(),
                ));
            }
            body.insert("slot_minutes".to_string(), json!(slot_minutes));
        }
        if let Some(gap_minutes) = request.gap_minutes {
            if gap_minutes < 0 {
                return Err(SchedulingError::InvalidTime(
                    "gap_minutes must not be negative".to_string(),
                ));
            }
            body.insert("gap_minutes".to_string(), json!(gap_minutes));
        }

        let update_path = format!("/rest/v1/availability_rules?id=eq.{}", rule_id);
        let updated: Vec<AvailabilityRule> = self
            .supabase
            .update(&update_path, serde_json::Value::Object(body))
            .await?;

        updated.into_iter().next().ok_or(SchedulingError::NotFound)
    }

    /// Free slot starts for a date: rule slots for the weekday minus those
    /// intersecting a calendar busy window. Empty when no rule covers the day.
    pub async fn available_slots(
        &self,
        calendar: &CalendarClient,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, SchedulingError> {
        let day_of_week = date.weekday().num_days_from_sunday() as i32;
        let rules = self.active_rules_for_day(day_of_week).await?;

        if rules.is_empty() {
            debug!("No availability rule for {} (weekday {})", date, day_of_week);
            return Ok(Vec::new());
        }

        let day_start = date.and_time(NaiveTime::MIN).and_utc();
        let day_end = day_start + Duration::days(1);
        let busy = calendar.busy_windows(day_start, day_end).await?;

        let mut slots: Vec<NaiveTime> = Vec::new();
        for rule in &rules {
            let slot_len = Duration::minutes(rule.slot_minutes);
            for start in generate_rule_slots(rule) {
                let slot_start = date.and_time(start).and_utc();
                let slot_end = slot_start + slot_len;
                let taken = busy
                    .iter()
                    .any(|w| overlaps(slot_start, slot_end, w.start, w.end));
                if !taken {
                    slots.push(start);
                }
            }
        }

        slots.sort();
        slots.dedup();
        Ok(slots)
    }

    /// Revalidate a single slot right before committing a booking.
    pub async fn slot_is_free(
        &self,
        calendar: &CalendarClient,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<i64>, SchedulingError> {
        let day_of_week = date.weekday().num_days_from_sunday() as i32;
        let rules = self.active_rules_for_day(day_of_week).await?;

        let Some(rule) = rules
            .iter()
            .find(|r| generate_rule_slots(r).contains(&time))
        else {
            return Ok(None);
        };

        let slot_start = date.and_time(time).and_utc();
        let slot_end = slot_start + Duration::minutes(rule.slot_minutes);
        let busy = calendar.busy_windows(slot_start, slot_end).await?;

        let taken = busy
            .iter()
            .any(|w| overlaps(slot_start, slot_end, w.start, w.end));

        if taken {
            Ok(None)
        } else {
            Ok(Some(rule.slot_minutes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rule(start: &str, end: &str, slot: i64, gap: i64) -> AvailabilityRule {
        AvailabilityRule {
            id: Uuid::new_v4(),
            day_of_week: 1,
            start_time: start.parse().unwrap(),
            end_time: end.parse().unwrap(),
            slot_minutes: slot,
            gap_minutes: gap,
            active: true,
        }
    }

    #[test]
    fn generates_slots_stepped_by_duration_plus_gap() {
        let slots = generate_rule_slots(&rule("08:00:00", "10:00:00", 50, 10));
        let expected: Vec<NaiveTime> =
            vec!["08:00:00".parse().unwrap(), "09:00:00".parse().unwrap()];
        assert_eq!(slots, expected);
    }

    #[test]
    fn partial_slot_at_end_of_window_is_dropped() {
        // 10:00 slot ends at 10:50, exactly on the rule end
        let slots = generate_rule_slots(&rule("08:00:00", "10:50:00", 50, 10));
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[2], "10:00:00".parse::<NaiveTime>().unwrap());

        // 10:00 + 50min overruns a 10:30 end, so the slot is dropped
        let slots = generate_rule_slots(&rule("08:00:00", "10:30:00", 50, 10));
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn degenerate_rules_produce_no_slots() {
        assert!(generate_rule_slots(&rule("10:00:00", "10:00:00", 50, 10)).is_empty());
        assert!(generate_rule_slots(&rule("10:00:00", "09:00:00", 50, 10)).is_empty());
        assert!(generate_rule_slots(&rule("08:00:00", "10:00:00", 0, 10)).is_empty());
    }

    #[test]
    fn back_to_back_windows_do_not_overlap() {
        let t = |h: u32| Utc.with_ymd_and_hms(2026, 1, 19, h, 0, 0).unwrap();
        assert!(!overlaps(t(8), t(9), t(9), t(10)));
        assert!(overlaps(t(8), t(10), t(9), t(11)));
        assert!(overlaps(t(9), t(10), t(8), t(12)));
    }
}
