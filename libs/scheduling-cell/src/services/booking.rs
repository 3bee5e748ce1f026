use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use customer_cell::models::Customer;
use shared_config::AppConfig;
use shared_database::audit::{AuditEntry, AuditLog};
use shared_database::supabase::{DbError, SupabaseClient};

use crate::models::{Appointment, AppointmentStatus, SchedulingError};
use crate::services::availability::AvailabilityService;
use crate::services::calendar::CalendarClient;

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    availability: AvailabilityService,
    calendar: CalendarClient,
    audit: AuditLog,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            availability: AvailabilityService::with_client(supabase.clone()),
            calendar: CalendarClient::new(config),
            audit: AuditLog::new(supabase.clone()),
            supabase,
        }
    }

    pub async fn find_by_id(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&select=*", appointment_id);
        self.supabase
            .select(&path)
            .await?
            .into_iter()
            .next()
            .ok_or(SchedulingError::NotFound)
    }

    /// Appointments a customer can still act on: not yet started, not in a
    /// terminal state. Ordered soonest first.
    pub async fn upcoming_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?customer_id=eq.{}&status=in.(scheduled,confirmed)&scheduled_start=gte.{}&select=*&order=scheduled_start.asc",
            customer_id,
            urlencoding::encode(&Utc::now().to_rfc3339()),
        );
        let appointments = self.supabase.select(&path).await?;
        Ok(appointments)
    }

    /// Book a slot for a customer.
    ///
    /// The slot is revalidated against the calendar immediately before
    /// committing. The calendar event is created first and the appointment row
    /// references it; the unique calendar_event_id column is the backstop when
    /// two bookings race past the revalidation.
    pub async fn book(
        &self,
        customer: &Customer,
        date: NaiveDate,
        time: NaiveTime,
        default_price: f64,
    ) -> Result<Appointment, SchedulingError> {
        let Some(slot_minutes) = self
            .availability
            .slot_is_free(&self.calendar, date, time)
            .await?
        else {
            return Err(SchedulingError::SlotTaken);
        };

        let scheduled_start = date.and_time(time).and_utc();
        let scheduled_end = scheduled_start + Duration::minutes(slot_minutes);
        let price = customer.session_price.unwrap_or(default_price);

        let summary = format!("Sessão - {}", customer.full_name);
        let event_id = self
            .calendar
            .create_event(&summary, scheduled_start, scheduled_end)
            .await?;

        let row = json!({
            "customer_id": customer.id,
            "appointment_date": date,
            "start_time": time,
            "scheduled_start": scheduled_start.to_rfc3339(),
            "scheduled_end": scheduled_end.to_rfc3339(),
            "status": AppointmentStatus::Scheduled,
            "payment_status": "unbilled",
            "calendar_event_id": event_id,
            "price": price,
            "reminder_24h_sent": false,
            "reminder_2h_sent": false,
        });

        // Trail first: the audit row lands before the appointment does. The
        // calendar_event_id ties the entry to the insert below, so an entry
        // without a matching appointment marks a lost race or an orphan.
        self.audit
            .record(
                AuditEntry::new("appointment_booked")
                    .customer(customer.id)
                    .current(row.clone()),
            )
            .await?;

        let appointment: Appointment = match self.supabase.insert("appointments", row).await {
            Ok(a) => a,
            Err(DbError::Conflict(msg)) => {
                warn!("Booking lost the race for {} {}: {}", date, time, msg);
                return Err(SchedulingError::SlotTaken);
            }
            Err(e) => {
                // The calendar event exists but no appointment references it.
                // Left for manual reconciliation; no automatic compensation.
                error!(
                    "Appointment persist failed after creating calendar event {}: {}",
                    event_id, e
                );
                self.audit
                    .record_best_effort(
                        AuditEntry::new("calendar_event_orphaned")
                            .customer(customer.id)
                            .current(json!({ "calendar_event_id": event_id })),
                    )
                    .await;
                return Err(e.into());
            }
        };

        info!(
            "Booked appointment {} for customer {} at {} {}",
            appointment.id, customer.id, date, time
        );
        Ok(appointment)
    }

    /// Move an appointment to a new slot.
    ///
    /// Ordering is deliberate: the new event and appointment exist before the
    /// old appointment is retired, so a crash mid-way leaves the customer with
    /// a session rather than without one.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        customer: &Customer,
        new_date: NaiveDate,
        new_time: NaiveTime,
    ) -> Result<Appointment, SchedulingError> {
        let old = self.find_by_id(appointment_id).await?;
        if old.status.is_terminal() {
            return Err(SchedulingError::Terminal);
        }

        let new_appointment = self
            .book(customer, new_date, new_time, old.price)
            .await?;

        self.audit
            .record(
                AuditEntry::new("appointment_rescheduled")
                    .customer(customer.id)
                    .appointment(new_appointment.id)
                    .previous(json!(old))
                    .current(json!(new_appointment)),
            )
            .await?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.(scheduled,confirmed)",
            old.id
        );
        let retired: Vec<Appointment> = self
            .supabase
            .update(
                &path,
                json!({
                    "status": AppointmentStatus::Rescheduled,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        if retired.is_empty() {
            warn!(
                "Appointment {} changed state during reschedule; new appointment {} stands",
                old.id, new_appointment.id
            );
        }

        if let Some(event_id) = &old.calendar_event_id {
            if let Err(e) = self.calendar.delete_event(event_id).await {
                warn!(
                    "Failed to delete calendar event {} for rescheduled appointment {}: {}",
                    event_id, old.id, e
                );
            }
        }

        Ok(new_appointment)
    }

    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.find_by_id(appointment_id).await?;

        if appointment.status == AppointmentStatus::Completed {
            return Err(SchedulingError::CannotCancelCompleted);
        }
        if appointment.status.is_terminal() {
            return Err(SchedulingError::Terminal);
        }

        self.audit
            .record(
                AuditEntry::new("appointment_cancelled")
                    .customer(appointment.customer_id)
                    .appointment(appointment.id)
                    .previous(json!(appointment))
                    .current(json!({
                        "status": AppointmentStatus::Cancelled,
                        "cancellation_reason": reason,
                    })),
            )
            .await?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.(scheduled,confirmed)",
            appointment_id
        );
        let cancelled: Appointment = self
            .supabase
            .update(
                &path,
                json!({
                    "status": AppointmentStatus::Cancelled,
                    "cancellation_reason": reason,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?
            .into_iter()
            .next()
            .ok_or(SchedulingError::Terminal)?;

        if let Some(event_id) = &cancelled.calendar_event_id {
            if let Err(e) = self.calendar.delete_event(event_id).await {
                warn!(
                    "Failed to delete calendar event {} for cancelled appointment {}: {}",
                    event_id, appointment_id, e
                );
            }
        }

        info!("Cancelled appointment {}", appointment_id);
        Ok(cancelled)
    }

    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::Completed, "appointment_completed")
            .await
    }

    pub async fn mark_no_show(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::NoShow, "appointment_no_show")
            .await
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        to: AppointmentStatus,
        event_kind: &str,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.find_by_id(appointment_id).await?;
        if current.status.is_terminal() {
            return Err(SchedulingError::Terminal);
        }

        self.audit
            .record(
                AuditEntry::new(event_kind)
                    .customer(current.customer_id)
                    .appointment(current.id)
                    .previous(json!(current))
                    .current(json!({ "status": to })),
            )
            .await?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.(scheduled,confirmed)",
            appointment_id
        );
        let updated: Appointment = self
            .supabase
            .update(
                &path,
                json!({
                    "status": to,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?
            .into_iter()
            .next()
            .ok_or(SchedulingError::Terminal)?;

        Ok(updated)
    }
}
