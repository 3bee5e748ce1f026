use serde_json::json;
use tracing::{debug, info};

use customer_cell::models::{ConversationState, Customer};
use scheduling_cell::models::SchedulingError;
use shared_utils::helpers::format_br_date;

use crate::messages;
use crate::models::{ConversationError, FlowContext};
use crate::services::booking_flow::parse_listed_time;
use crate::services::orchestrator::{
    format_appointment_entries, parse_index_choice, parse_slot_choice, Orchestrator,
};

impl Orchestrator {
    pub(crate) async fn start_reschedule(
        &self,
        customer: &Customer,
    ) -> Result<(), ConversationError> {
        let upcoming = self.booking.upcoming_for_customer(customer.id).await?;
        if upcoming.is_empty() {
            self.send(customer, messages::NO_APPOINTMENTS).await?;
            self.send(customer, messages::MAIN_MENU).await?;
            return Ok(());
        }

        let context = FlowContext {
            appointments: Some(upcoming.iter().map(|a| a.id).collect()),
            ..Default::default()
        };
        let moved = self
            .customers
            .set_state_if(
                customer.id,
                ConversationState::MainMenu,
                ConversationState::RescheduleChoosingAppointment,
                Some(json!(context)),
            )
            .await?;
        if !moved {
            return Ok(());
        }

        let entries = format_appointment_entries(&upcoming);
        self.send(customer, &messages::choose_to_reschedule(&entries))
            .await?;
        Ok(())
    }

    pub(crate) async fn handle_reschedule_choice(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<(), ConversationError> {
        let context = Self::context_of(customer);
        let Some(appointments) = context.appointments.clone() else {
            return self.reset_to_menu(customer).await;
        };

        let Some(index) = parse_index_choice(input, appointments.len()) else {
            self.send(customer, messages::OPTION_INVALID).await?;
            return Ok(());
        };

        let context = FlowContext {
            selected_appointment: Some(appointments[index]),
            ..Default::default()
        };
        let moved = self
            .customers
            .set_state_if(
                customer.id,
                ConversationState::RescheduleChoosingAppointment,
                ConversationState::RescheduleAwaitingDate,
                Some(json!(context)),
            )
            .await?;
        if !moved {
            debug!("Customer {} raced out of reschedule choice", customer.id);
            return Ok(());
        }

        self.send(customer, messages::ASK_NEW_DATE).await?;
        Ok(())
    }

    pub(crate) async fn handle_reschedule_date(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<(), ConversationError> {
        let Some(date) = self.read_future_date(customer, input).await? else {
            return Ok(());
        };

        let slots = self.availability.available_slots(&self.calendar, date).await?;
        if slots.is_empty() {
            self.send(customer, messages::NO_SLOTS).await?;
            return Ok(());
        }

        let listed: Vec<String> = slots.iter().map(|s| s.format("%H:%M").to_string()).collect();
        let mut context = Self::context_of(customer);
        context.date = Some(date);
        context.slots = Some(listed.clone());

        let moved = self
            .customers
            .set_state_if(
                customer.id,
                ConversationState::RescheduleAwaitingDate,
                ConversationState::RescheduleAwaitingSlotChoice,
                Some(json!(context)),
            )
            .await?;
        if !moved {
            return Ok(());
        }

        self.send(customer, &messages::slot_list(&format_br_date(date), &listed))
            .await?;
        Ok(())
    }

    pub(crate) async fn handle_reschedule_slot(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<(), ConversationError> {
        let context = Self::context_of(customer);
        let (Some(appointment_id), Some(date), Some(slots)) = (
            context.selected_appointment,
            context.date,
            context.slots.clone(),
        ) else {
            return self.reset_to_menu(customer).await;
        };

        let Some(index) = parse_slot_choice(input, &slots) else {
            self.send(customer, messages::TIME_INVALID).await?;
            self.send(customer, &messages::slot_list(&format_br_date(date), &slots))
                .await?;
            return Ok(());
        };

        let time = parse_listed_time(&slots[index])?;
        let old = self.booking.find_by_id(appointment_id).await?;
        match self
            .booking
            .reschedule(appointment_id, customer, date, time)
            .await
        {
            Ok(new_appointment) => {
                info!(
                    "Customer {} rescheduled {} to {} via conversation",
                    customer.id, appointment_id, new_appointment.id
                );
                self.customers
                    .set_state(customer.id, ConversationState::MainMenu, Some(json!({})))
                    .await?;
                self.send(
                    customer,
                    &messages::reschedule_confirmed(
                        &format_br_date(old.appointment_date),
                        &format_br_date(date),
                        &slots[index],
                    ),
                )
                .await?;
                Ok(())
            }
            Err(SchedulingError::SlotTaken) => {
                self.offer_remaining_slots(
                    customer,
                    date,
                    ConversationState::RescheduleAwaitingSlotChoice,
                    ConversationState::RescheduleAwaitingDate,
                )
                .await
            }
            Err(e) => Err(e.into()),
        }
    }
}
