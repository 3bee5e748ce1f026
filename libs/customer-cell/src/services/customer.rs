use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::helpers::normalize_phone;

use crate::models::{ConversationState, Customer, CustomerError, UpdateCustomerRequest};

pub struct CustomerService {
    supabase: Arc<SupabaseClient>,
}

impl CustomerService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn find_by_id(&self, customer_id: Uuid) -> Result<Customer, CustomerError> {
        let path = format!("/rest/v1/customers?id=eq.{}", customer_id);
        let rows: Vec<Customer> = self.supabase.select(&path).await?;
        rows.into_iter().next().ok_or(CustomerError::NotFound)
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer>, CustomerError> {
        let normalized = normalize_phone(phone);
        let path = format!("/rest/v1/customers?phone=eq.{}", normalized);
        let rows: Vec<Customer> = self.supabase.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    /// Create a customer on first contact. Starts the registration flow.
    pub async fn create_from_first_contact(
        &self,
        phone: &str,
        display_name: &str,
    ) -> Result<Customer, CustomerError> {
        let normalized = normalize_phone(phone);
        debug!("Creating customer for phone {}", normalized);

        let row = json!({
            "phone": normalized,
            "full_name": display_name,
            "conversation_state": ConversationState::CollectingName,
            "flow_context": {},
            "billing_method": "PIX",
            "registration_complete": false,
            "active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let customer: Customer = self.supabase.insert("customers", row).await?;
        info!("New customer created: {}", customer.id);
        Ok(customer)
    }

    /// Unconditional state transition, optionally replacing the scratch-pad.
    pub async fn set_state(
        &self,
        customer_id: Uuid,
        state: ConversationState,
        flow_context: Option<Value>,
    ) -> Result<(), CustomerError> {
        let mut body = json!({
            "conversation_state": state,
            "updated_at": Utc::now().to_rfc3339(),
        });
        if let Some(ctx) = flow_context {
            body["flow_context"] = ctx;
        }

        let path = format!("/rest/v1/customers?id=eq.{}", customer_id);
        let updated: Vec<Customer> = self.supabase.update(&path, body).await?;
        if updated.is_empty() {
            return Err(CustomerError::NotFound);
        }
        Ok(())
    }

    /// Conditional state transition keyed on the previous state value.
    ///
    /// Returns false when the row was no longer in `expected` — the caller
    /// lost a race against a concurrent message from the same customer and
    /// must drop its transition.
    pub async fn set_state_if(
        &self,
        customer_id: Uuid,
        expected: ConversationState,
        state: ConversationState,
        flow_context: Option<Value>,
    ) -> Result<bool, CustomerError> {
        let mut body = json!({
            "conversation_state": state,
            "updated_at": Utc::now().to_rfc3339(),
        });
        if let Some(ctx) = flow_context {
            body["flow_context"] = ctx;
        }

        let path = format!(
            "/rest/v1/customers?id=eq.{}&conversation_state=eq.{}",
            customer_id, expected
        );
        let updated: Vec<Customer> = self.supabase.update(&path, body).await?;
        Ok(!updated.is_empty())
    }

    /// Partial field update used by the registration flow.
    pub async fn update_fields(
        &self,
        customer_id: Uuid,
        mut fields: Value,
    ) -> Result<Customer, CustomerError> {
        fields["updated_at"] = json!(Utc::now().to_rfc3339());

        let path = format!("/rest/v1/customers?id=eq.{}", customer_id);
        let updated: Vec<Customer> = self.supabase.update(&path, fields).await?;
        updated.into_iter().next().ok_or(CustomerError::NotFound)
    }

    pub async fn set_asaas_customer_id(
        &self,
        customer_id: Uuid,
        asaas_customer_id: &str,
    ) -> Result<(), CustomerError> {
        self.update_fields(customer_id, json!({ "asaas_customer_id": asaas_customer_id }))
            .await?;
        Ok(())
    }

    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        request: UpdateCustomerRequest,
    ) -> Result<Customer, CustomerError> {
        let mut fields = serde_json::Map::new();
        if let Some(name) = request.full_name {
            if name.trim().len() < 3 {
                return Err(CustomerError::Validation(
                    "name must be at least 3 characters".to_string(),
                ));
            }
            fields.insert("full_name".to_string(), json!(name));
        }
        if let Some(cpf) = request.cpf {
            if !shared_utils::helpers::validate_cpf(&cpf) {
                return Err(CustomerError::Validation("invalid CPF".to_string()));
            }
            let digits: String = cpf.chars().filter(|c| c.is_ascii_digit()).collect();
            fields.insert("cpf".to_string(), json!(digits));
        }
        if let Some(email) = request.email {
            fields.insert("email".to_string(), json!(email));
        }
        if let Some(method) = request.billing_method {
            fields.insert("billing_method".to_string(), json!(method));
        }
        if let Some(price) = request.session_price {
            fields.insert("session_price".to_string(), json!(price));
        }

        self.update_fields(customer_id, Value::Object(fields)).await
    }

    /// Customers are never deleted, only deactivated.
    pub async fn deactivate(&self, customer_id: Uuid) -> Result<Customer, CustomerError> {
        info!("Deactivating customer {}", customer_id);
        self.update_fields(customer_id, json!({ "active": false }))
            .await
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<Customer>, CustomerError> {
        let path = if active_only {
            "/rest/v1/customers?active=eq.true&order=created_at.desc".to_string()
        } else {
            "/rest/v1/customers?order=created_at.desc".to_string()
        };
        Ok(self.supabase.select(&path).await?)
    }
}
