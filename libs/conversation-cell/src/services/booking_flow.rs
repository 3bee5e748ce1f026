use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use tracing::{debug, info};

use customer_cell::models::{ConversationState, Customer};
use scheduling_cell::models::SchedulingError;
use shared_utils::helpers::{format_br_date, format_currency, parse_br_date};

use crate::messages;
use crate::models::{ConversationError, FlowContext};
use crate::services::orchestrator::{parse_slot_choice, Orchestrator};

impl Orchestrator {
    pub(crate) async fn start_booking(
        &self,
        customer: &Customer,
    ) -> Result<(), ConversationError> {
        let moved = self
            .customers
            .set_state_if(
                customer.id,
                ConversationState::MainMenu,
                ConversationState::BookingAwaitingDate,
                Some(json!({})),
            )
            .await?;
        if !moved {
            debug!("Customer {} left main_menu concurrently", customer.id);
            return Ok(());
        }

        self.send(customer, messages::ASK_DATE).await?;
        Ok(())
    }

    pub(crate) async fn handle_booking_date(
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
        let context = FlowContext {
            date: Some(date),
            slots: Some(listed.clone()),
            ..Default::default()
        };

        let moved = self
            .customers
            .set_state_if(
                customer.id,
                ConversationState::BookingAwaitingDate,
                ConversationState::BookingAwaitingSlotChoice,
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

    pub(crate) async fn handle_booking_slot(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<(), ConversationError> {
        let context = Self::context_of(customer);
        let (Some(date), Some(slots)) = (context.date, context.slots.clone()) else {
            // Scratch-pad lost its flow data; nothing to resume
            return self.reset_to_menu(customer).await;
        };

        let Some(index) = parse_slot_choice(input, &slots) else {
            self.send(customer, messages::TIME_INVALID).await?;
            self.send(customer, &messages::slot_list(&format_br_date(date), &slots))
                .await?;
            return Ok(());
        };

        let time = parse_listed_time(&slots[index])?;
        match self
            .booking
            .book(customer, date, time, self.config.default_session_price)
            .await
        {
            Ok(appointment) => {
                info!(
                    "Customer {} booked appointment {} via conversation",
                    customer.id, appointment.id
                );
                self.customers
                    .set_state(customer.id, ConversationState::MainMenu, Some(json!({})))
                    .await?;
                self.send(
                    customer,
                    &messages::booking_confirmed(
                        &format_br_date(date),
                        &slots[index],
                        &format_currency(appointment.price),
                    ),
                )
                .await?;
                Ok(())
            }
            Err(SchedulingError::SlotTaken) => {
                self.offer_remaining_slots(
                    customer,
                    date,
                    ConversationState::BookingAwaitingSlotChoice,
                    ConversationState::BookingAwaitingDate,
                )
                .await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse and bound-check a flow date; replies and returns None on bad
    /// input so the caller can leave the state untouched.
    pub(crate) async fn read_future_date(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<Option<NaiveDate>, ConversationError> {
        let Some(date) = parse_br_date(input) else {
            self.send(customer, messages::DATE_INVALID).await?;
            return Ok(None);
        };

        if date < Utc::now().date_naive() {
            self.send(customer, messages::DATE_IN_PAST).await?;
            return Ok(None);
        }

        Ok(Some(date))
    }

    /// After losing a slot race: re-list what is still free for the chosen
    /// date, or fall back to asking for a new date when nothing is left.
    pub(crate) async fn offer_remaining_slots(
        &self,
        customer: &Customer,
        date: NaiveDate,
        current_state: ConversationState,
        date_state: ConversationState,
    ) -> Result<(), ConversationError> {
        let remaining = self.availability.available_slots(&self.calendar, date).await?;

        if remaining.is_empty() {
            let mut context = Self::context_of(customer);
            context.date = None;
            context.slots = None;
            self.customers
                .set_state_if(customer.id, current_state, date_state, Some(json!(context)))
                .await?;
            self.send(customer, messages::SLOT_TAKEN).await?;
            self.send(customer, messages::NO_SLOTS).await?;
            return Ok(());
        }

        let listed: Vec<String> = remaining
            .iter()
            .map(|s| s.format("%H:%M").to_string())
            .collect();
        let mut context = Self::context_of(customer);
        context.slots = Some(listed.clone());
        self.customers
            .set_state(customer.id, current_state, Some(json!(context)))
            .await?;

        self.send(customer, messages::SLOT_TAKEN).await?;
        self.send(customer, &messages::slot_list(&format_br_date(date), &listed))
            .await?;
        Ok(())
    }
}

pub(crate) fn parse_listed_time(value: &str) -> Result<NaiveTime, ConversationError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ConversationError::StateLost(format!("unparseable listed slot {}", value)))
}
