use serde_json::json;
use tracing::info;

use customer_cell::models::{ConversationState, Customer};
use messaging_cell::models::ReplyButton;
use shared_utils::helpers::format_br_date;

use crate::messages;
use crate::models::{ConversationError, FlowContext};
use crate::services::orchestrator::{
    format_appointment_entries, parse_index_choice, Orchestrator,
};

const CANCELLED_BY_CUSTOMER: &str = "cancelado pelo cliente via WhatsApp";

impl Orchestrator {
    pub(crate) async fn start_cancellation(
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
                ConversationState::CancelChoosingAppointment,
                Some(json!(context)),
            )
            .await?;
        if !moved {
            return Ok(());
        }

        let entries = format_appointment_entries(&upcoming);
        self.send(customer, &messages::choose_to_cancel(&entries))
            .await?;
        Ok(())
    }

    pub(crate) async fn handle_cancel_choice(
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

        let appointment = self.booking.find_by_id(appointments[index]).await?;
        let context = FlowContext {
            selected_appointment: Some(appointment.id),
            ..Default::default()
        };
        let moved = self
            .customers
            .set_state_if(
                customer.id,
                ConversationState::CancelChoosingAppointment,
                ConversationState::CancelAwaitingConfirmation,
                Some(json!(context)),
            )
            .await?;
        if !moved {
            return Ok(());
        }

        self.messaging
            .send_buttons(
                &customer.phone,
                &messages::confirm_cancellation(
                    &format_br_date(appointment.appointment_date),
                    &appointment.start_time.format("%H:%M").to_string(),
                ),
                &[
                    ReplyButton::new("SIM", "✅ Sim, cancelar"),
                    ReplyButton::new("NAO", "↩️ Não, voltar"),
                ],
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn handle_cancel_confirmation(
        &self,
        customer: &Customer,
        input: &str,
    ) -> Result<(), ConversationError> {
        let context = Self::context_of(customer);
        let Some(appointment_id) = context.selected_appointment else {
            return self.reset_to_menu(customer).await;
        };

        match input.trim().to_uppercase().as_str() {
            "SIM" | "S" => {
                self.booking
                    .cancel(appointment_id, Some(CANCELLED_BY_CUSTOMER.to_string()))
                    .await?;
                info!(
                    "Customer {} cancelled appointment {} via conversation",
                    customer.id, appointment_id
                );
                self.customers
                    .set_state(customer.id, ConversationState::MainMenu, Some(json!({})))
                    .await?;
                self.send(customer, messages::CANCELLATION_DONE).await?;
                self.send(customer, messages::MAIN_MENU).await?;
                Ok(())
            }
            "NÃO" | "NAO" | "N" => {
                self.customers
                    .set_state(customer.id, ConversationState::MainMenu, Some(json!({})))
                    .await?;
                self.send(customer, messages::CANCELLATION_ABORTED).await?;
                self.send(customer, messages::MAIN_MENU).await?;
                Ok(())
            }
            _ => {
                self.send(customer, messages::OPTION_INVALID).await?;
                Ok(())
            }
        }
    }
}
