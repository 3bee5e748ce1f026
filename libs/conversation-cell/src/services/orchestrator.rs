use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use customer_cell::models::{ConversationState, Customer};
use customer_cell::services::CustomerService;
use messaging_cell::client::MessagingClient;
use scheduling_cell::models::Appointment;
use scheduling_cell::services::availability::AvailabilityService;
use scheduling_cell::services::booking::BookingService;
use scheduling_cell::services::calendar::CalendarClient;
use shared_config::AppConfig;
use shared_utils::helpers::{format_br_date, validate_cpf};

use crate::messages;
use crate::models::{ConversationError, FlowContext};

/// Drives one customer's conversation: every inbound WhatsApp message lands
/// here, gets routed by the customer's persisted state, and leaves at most one
/// state transition behind.
pub struct Orchestrator {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) customers: CustomerService,
    pub(crate) booking: BookingService,
    pub(crate) availability: AvailabilityService,
    pub(crate) calendar: CalendarClient,
    pub(crate) messaging: MessagingClient,
}

const GLOBAL_MENU_COMMANDS: [&str; 3] = ["MENU", "INICIO", "INÍCIO"];

impl Orchestrator {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            customers: CustomerService::new(&config),
            booking: BookingService::new(&config),
            availability: AvailabilityService::new(&config),
            calendar: CalendarClient::new(&config),
            messaging: MessagingClient::new(&config),
            config,
        }
    }

    /// Entry point for a normalized inbound message.
    ///
    /// Failures inside a flow send the generic error message and propagate,
    /// leaving the customer's state untouched so the conversation can resume.
    pub async fn handle_inbound(
        &self,
        phone: &str,
        contact_name: Option<&str>,
        input: &str,
    ) -> Result<(), ConversationError> {
        match self.dispatch(phone, contact_name, input).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Conversation handling failed for {}: {}", phone, e);
                if let Err(send_err) = self
                    .messaging
                    .send_text(phone, messages::GENERIC_ERROR)
                    .await
                {
                    warn!("Failed to send error notice to {}: {}", phone, send_err);
                }
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        phone: &str,
        contact_name: Option<&str>,
        input: &str,
    ) -> Result<(), ConversationError> {
        let Some(customer) = self.customers.find_by_phone(phone).await? else {
            let customer = self
                .customers
                .create_from_first_contact(phone, contact_name.unwrap_or("Cliente"))
                .await?;
            info!("First contact from {}, starting registration", customer.id);
            self.send(&customer, messages::WELCOME_NEW).await?;
            self.send(&customer, messages::ASK_NAME).await?;
            return Ok(());
        };

        let command = input.trim().to_uppercase();
        if GLOBAL_MENU_COMMANDS.contains(&command.as_str()) {
            return self.handle_menu_command(&customer).await;
        }

        if customer.conversation_state == ConversationState::InHumanHandoff {
            self.send(&customer, messages::IN_HUMAN_SERVICE).await?;
            return Ok(());
        }

        if !customer.registration_complete {
            return self.handle_registration(&customer, input).await;
        }

        debug!(
            "Dispatching message for customer {} in state {}",
            customer.id, customer.conversation_state
        );
        match customer.conversation_state {
            ConversationState::MainMenu => self.handle_menu_choice(&customer, input).await,
            ConversationState::BookingAwaitingDate => {
                self.handle_booking_date(&customer, input).await
            }
            ConversationState::BookingAwaitingSlotChoice => {
                self.handle_booking_slot(&customer, input).await
            }
            ConversationState::RescheduleChoosingAppointment => {
                self.handle_reschedule_choice(&customer, input).await
            }
            ConversationState::RescheduleAwaitingDate => {
                self.handle_reschedule_date(&customer, input).await
            }
            ConversationState::RescheduleAwaitingSlotChoice => {
                self.handle_reschedule_slot(&customer, input).await
            }
            ConversationState::CancelChoosingAppointment => {
                self.handle_cancel_choice(&customer, input).await
            }
            ConversationState::CancelAwaitingConfirmation => {
                self.handle_cancel_confirmation(&customer, input).await
            }
            // Registration states with a completed registration, or new:
            // nothing sensible to resume, show the menu
            _ => self.reset_to_menu(&customer).await,
        }
    }

    /// `MENU` from anywhere returns to the main menu. Inside a human handoff
    /// it additionally ends the handoff, mirroring the operator-side exit.
    async fn handle_menu_command(&self, customer: &Customer) -> Result<(), ConversationError> {
        if customer.conversation_state == ConversationState::InHumanHandoff {
            info!("Customer {} ended human handoff via MENU", customer.id);
            self.customers
                .set_state(customer.id, ConversationState::MainMenu, Some(json!({})))
                .await?;
            self.send(customer, messages::HANDOFF_ENDED).await?;
            self.send(customer, messages::MAIN_MENU).await?;
            return Ok(());
        }

        self.reset_to_menu(customer).await
    }

    pub(crate) async fn reset_to_menu(
        &self,
        customer: &Customer,
    ) -> Result<(), ConversationError> {
        self.customers
            .set_state(customer.id, ConversationState::MainMenu, Some(json!({})))
            .await?;
        self.send(customer, messages::MAIN_MENU).await?;
        Ok(())
    }

    async fn handle_registration(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<(), ConversationError> {
        match customer.conversation_state {
            ConversationState::CollectingTaxId => self.collect_tax_id(customer, input).await,
            ConversationState::CollectingEmail => self.collect_email(customer, input).await,
            // new / collecting_name / anything else mid-registration
            _ => self.collect_name(customer, input).await,
        }
    }

    async fn collect_name(&self, customer: &Customer, input: &str) -> Result<(), ConversationError> {
        let name = input.trim();
        if name.chars().count() < 3 {
            self.send(customer, messages::NAME_INVALID).await?;
            return Ok(());
        }

        self.customers
            .update_fields(customer.id, json!({ "full_name": name }))
            .await?;
        self.customers
            .set_state(customer.id, ConversationState::CollectingTaxId, None)
            .await?;
        self.send(customer, messages::ASK_CPF).await?;
        Ok(())
    }

    async fn collect_tax_id(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<(), ConversationError> {
        if !validate_cpf(input) {
            self.send(customer, messages::CPF_INVALID).await?;
            return Ok(());
        }

        let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
        self.customers
            .update_fields(customer.id, json!({ "cpf": digits }))
            .await?;
        self.customers
            .set_state(customer.id, ConversationState::CollectingEmail, None)
            .await?;
        self.send(customer, messages::ASK_EMAIL).await?;
        Ok(())
    }

    async fn collect_email(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<(), ConversationError> {
        let value = input.trim();
        let email = if value.eq_ignore_ascii_case("pular") {
            None
        } else if value.contains('@') {
            Some(value.to_string())
        } else {
            self.send(customer, messages::EMAIL_INVALID).await?;
            return Ok(());
        };

        let updated = self
            .customers
            .update_fields(
                customer.id,
                json!({ "email": email, "registration_complete": true }),
            )
            .await?;
        self.customers
            .set_state(customer.id, ConversationState::MainMenu, Some(json!({})))
            .await?;
        self.send(customer, &messages::registration_done(&updated.full_name))
            .await?;
        self.send(customer, messages::MAIN_MENU).await?;
        Ok(())
    }

    async fn handle_menu_choice(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<(), ConversationError> {
        let choice = input.trim().to_lowercase();
        match choice.as_str() {
            "1" | "agendar" => self.start_booking(customer).await,
            "2" | "minhas sessões" | "minhas sessoes" => self.list_appointments(customer).await,
            "3" | "reagendar" => self.start_reschedule(customer).await,
            "4" | "cancelar" => self.start_cancellation(customer).await,
            "5" | "atendente" => self.start_handoff(customer).await,
            _ => {
                self.send(customer, messages::OPTION_INVALID).await?;
                self.send(customer, messages::MAIN_MENU).await?;
                Ok(())
            }
        }
    }

    async fn list_appointments(&self, customer: &Customer) -> Result<(), ConversationError> {
        let upcoming = self.booking.upcoming_for_customer(customer.id).await?;
        if upcoming.is_empty() {
            self.send(customer, messages::NO_APPOINTMENTS).await?;
            self.send(customer, messages::MAIN_MENU).await?;
            return Ok(());
        }

        let entries = format_appointment_entries(&upcoming);
        self.send(customer, &messages::appointment_list(&entries))
            .await?;
        Ok(())
    }

    async fn start_handoff(&self, customer: &Customer) -> Result<(), ConversationError> {
        info!("Customer {} requested human handoff", customer.id);
        self.customers
            .set_state(
                customer.id,
                ConversationState::InHumanHandoff,
                Some(json!({})),
            )
            .await?;
        self.send(customer, messages::TRANSFER_TO_HUMAN).await?;
        Ok(())
    }

    /// Operator-side handoff exit. Returns false when the customer was not in
    /// a handoff.
    pub async fn finish_handoff(&self, customer_id: Uuid) -> Result<bool, ConversationError> {
        let customer = self.customers.find_by_id(customer_id).await?;
        let ended = self
            .customers
            .set_state_if(
                customer.id,
                ConversationState::InHumanHandoff,
                ConversationState::MainMenu,
                Some(json!({})),
            )
            .await?;

        if ended {
            info!("Operator finished handoff for customer {}", customer.id);
            self.send(&customer, messages::HANDOFF_ENDED).await?;
            self.send(&customer, messages::MAIN_MENU).await?;
        }
        Ok(ended)
    }

    pub(crate) async fn send(
        &self,
        customer: &Customer,
        body: &str,
    ) -> Result<(), ConversationError> {
        self.messaging.send_text(&customer.phone, body).await?;
        Ok(())
    }

    pub(crate) fn context_of(customer: &Customer) -> FlowContext {
        FlowContext::from_value(customer.flow_context.as_ref())
    }
}

/// `1️⃣ 19/01/2026 às 10:00` line per appointment, in listing order.
pub(crate) fn format_appointment_entries(appointments: &[Appointment]) -> String {
    appointments
        .iter()
        .enumerate()
        .map(|(i, a)| {
            format!(
                "{}️⃣ {} às {}",
                i + 1,
                format_br_date(a.appointment_date),
                a.start_time.format("%H:%M"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Interprets a slot choice as either a 1-based index into the listed slots
/// or a literal `HH:MM` that was listed.
pub(crate) fn parse_slot_choice(input: &str, slots: &[String]) -> Option<usize> {
    let value = input.trim();

    if let Ok(index) = value.parse::<usize>() {
        if (1..=slots.len()).contains(&index) {
            return Some(index - 1);
        }
        return None;
    }

    slots.iter().position(|s| s == value)
}

/// 1-based index into a previously listed set of choices.
pub(crate) fn parse_index_choice(input: &str, len: usize) -> Option<usize> {
    let index = input.trim().parse::<usize>().ok()?;
    if (1..=len).contains(&index) {
        Some(index - 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> Vec<String> {
        vec!["08:00".to_string(), "09:00".to_string(), "10:00".to_string()]
    }

    #[test]
    fn slot_choice_accepts_one_based_index() {
        assert_eq!(parse_slot_choice("1", &slots()), Some(0));
        assert_eq!(parse_slot_choice(" 3 ", &slots()), Some(2));
        assert_eq!(parse_slot_choice("0", &slots()), None);
        assert_eq!(parse_slot_choice("4", &slots()), None);
    }

    #[test]
    fn slot_choice_accepts_listed_literal_time() {
        assert_eq!(parse_slot_choice("09:00", &slots()), Some(1));
        assert_eq!(parse_slot_choice("11:00", &slots()), None);
        assert_eq!(parse_slot_choice("amanhã", &slots()), None);
    }

    #[test]
    fn index_choice_rejects_out_of_range() {
        assert_eq!(parse_index_choice("2", 3), Some(1));
        assert_eq!(parse_index_choice("4", 3), None);
        assert_eq!(parse_index_choice("abc", 3), None);
    }
}
