use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{
    AsaasCustomer, AsaasCustomerList, AsaasIdentificationField, AsaasPayment, AsaasPixQrCode,
    BillingError,
};

/// Asaas REST client. Authenticates with the `access_token` header the
/// provider expects.
pub struct AsaasClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AsaasClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build http client");

        Self {
            client,
            base_url: config.asaas_api_url.clone(),
            api_key: config.asaas_api_key.clone(),
        }
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, BillingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!("Asaas {} failed ({}): {}", what, status, body);
        Err(BillingError::Provider(format!(
            "{} failed ({}): {}",
            what, status, body
        )))
    }

    /// Look a customer up by CPF before creating one; the provider keeps CPF
    /// unique on its side, so this is the idempotent path.
    pub async fn find_customer_by_cpf(
        &self,
        cpf: &str,
    ) -> Result<Option<AsaasCustomer>, BillingError> {
        let url = format!("{}/customers?cpfCnpj={}", self.base_url, cpf);
        let response = self
            .client
            .get(&url)
            .header("access_token", &self.api_key)
            .send()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let list: AsaasCustomerList = Self::check(response, "customer lookup")
            .await?
            .json()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        Ok(list.data.into_iter().next())
    }

    pub async fn create_customer(
        &self,
        name: &str,
        cpf: &str,
        phone: &str,
        email: Option<&str>,
    ) -> Result<AsaasCustomer, BillingError> {
        let url = format!("{}/customers", self.base_url);
        let body = json!({
            "name": name,
            "cpfCnpj": cpf,
            "mobilePhone": phone,
            "email": email,
        });

        let response = self
            .client
            .post(&url)
            .header("access_token", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let customer: AsaasCustomer = Self::check(response, "customer creation")
            .await?
            .json()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        debug!("Created Asaas customer {}", customer.id);
        Ok(customer)
    }

    pub async fn create_payment(
        &self,
        asaas_customer_id: &str,
        billing_type: &str,
        value: f64,
        due_date: NaiveDate,
        description: &str,
        idempotency_key: &str,
    ) -> Result<AsaasPayment, BillingError> {
        let url = format!("{}/payments", self.base_url);
        let body = json!({
            "customer": asaas_customer_id,
            "billingType": billing_type,
            "value": value,
            "dueDate": due_date.format("%Y-%m-%d").to_string(),
            "description": description,
            "externalReference": idempotency_key,
        });

        let response = self
            .client
            .post(&url)
            .header("access_token", &self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let payment: AsaasPayment = Self::check(response, "payment creation")
            .await?
            .json()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        debug!("Created Asaas payment {}", payment.id);
        Ok(payment)
    }

    pub async fn get_pix_payload(&self, payment_id: &str) -> Result<Option<String>, BillingError> {
        let url = format!("{}/payments/{}/pixQrCode", self.base_url, payment_id);
        let response = self
            .client
            .get(&url)
            .header("access_token", &self.api_key)
            .send()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let qr: AsaasPixQrCode = Self::check(response, "pix qr code")
            .await?
            .json()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        Ok(qr.payload)
    }

    pub async fn get_boleto_line(&self, payment_id: &str) -> Result<Option<String>, BillingError> {
        let url = format!(
            "{}/payments/{}/identificationField",
            self.base_url, payment_id
        );
        let response = self
            .client
            .get(&url)
            .header("access_token", &self.api_key)
            .send()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let field: AsaasIdentificationField = Self::check(response, "boleto line")
            .await?
            .json()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        Ok(field.identification_field)
    }
}
