//! Issuer API client: card templates, card instances and instance status.
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use secrecy::SecretString;
use serde::Serialize;

use crate::config::IssuerConfig;
use crate::cover::cover_data_uri;
use crate::envelope::{decode_typed, encode, expect_status, Envelope};
use crate::error::TwalletError;
use crate::http_request::Request;
use crate::poller::{ActivationCallback, ActivationHandle, ActivationPoller, StatusSource};
use crate::types::{ExpireUnit, FieldSpec, InstanceFieldValue, InstanceRecord, TemplateSpec};

const TEMPLATES_PATH: &str = "/api/vc-items";
const INSTANCES_PATH: &str = "/api/vc-item-data";

/// Category every template is registered under.
const TEMPLATE_CATEGORY: u32 = 4;

const STATUS_CREATED: u16 = 201;
const STATUS_OK: u16 = 200;

/// Request body of `POST /api/vc-items`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplatePayload<'a> {
    serial_no: &'a str,
    name: &'a str,
    category: u32,
    expose: bool,
    length_expire: &'a str,
    unit_type_expire: ExpireUnit,
    #[serde(rename = "vcItemFieldDTOList")]
    fields: &'a [FieldSpec],
    #[serde(skip_serializing_if = "Option::is_none")]
    cover: Option<String>,
}

impl<'a> TemplatePayload<'a> {
    fn new(spec: &'a TemplateSpec) -> Self {
        Self {
            serial_no: &spec.serial_no,
            name: &spec.name,
            category: TEMPLATE_CATEGORY,
            expose: spec.expose,
            length_expire: spec.expire_length.as_str(),
            unit_type_expire: spec.expire_unit,
            fields: &spec.fields,
            cover: spec.cover.as_deref().and_then(cover_data_uri),
        }
    }
}

/// Request body of `POST /api/vc-item-data`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstancePayload<'a> {
    vc_id: i64,
    fields: &'a [InstanceFieldValue],
}

/// A freshly created card instance.
#[derive(Debug)]
pub struct IssuedInstance {
    /// The instance as returned by the service.
    pub record: InstanceRecord,
    /// The activation session, when a completion callback was supplied.
    pub activation: Option<ActivationHandle>,
}

/// Shared state of a [`CardIssuer`], also owned by every activation session it starts.
#[derive(Debug)]
struct IssuerClient {
    config: IssuerConfig,
    access_token: SecretString,
    request: Request,
}

impl IssuerClient {
    async fn fetch_status(&self, instance_id: i64) -> Result<Option<String>, TwalletError> {
        let url = self
            .config
            .endpoint(&format!("{INSTANCES_PATH}/{instance_id}"));
        let response = self
            .request
            .send(Method::GET, &url, &self.access_token, None)
            .await?;
        let envelope = expect_status("GetVCItemData", &response, STATUS_OK)?;

        Ok(envelope
            .get_str(&url, "vcCid")?
            .filter(|vc_cid| !vc_cid.is_empty())
            .map(ToString::to_string))
    }
}

#[async_trait]
impl StatusSource for IssuerClient {
    async fn fetch_status(&self, instance_id: i64) -> Result<Option<String>, TwalletError> {
        Self::fetch_status(self, instance_id).await
    }
}

/// Client for the issuer side of the digital wallet service.
///
/// The access token is the one mailed to the issuer on registration; it is sent with
/// every request and shared with the activation sessions the client starts.
#[derive(Debug, Clone)]
pub struct CardIssuer {
    inner: Arc<IssuerClient>,
}

impl CardIssuer {
    /// Creates a client for the sandbox service with default settings.
    #[must_use]
    pub fn new(access_token: SecretString) -> Self {
        Self::with_config(IssuerConfig::default(), access_token)
    }

    /// Creates a client with the given configuration.
    #[must_use]
    pub fn with_config(config: IssuerConfig, access_token: SecretString) -> Self {
        let request = Request::new(config.request_timeout, &config.user_agent);
        Self {
            inner: Arc::new(IssuerClient {
                config,
                access_token,
                request,
            }),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &IssuerConfig {
        &self.inner.config
    }

    /// Registers a card template.
    ///
    /// A cover that is neither JPEG nor PNG is left out of the request with a warning.
    /// Returns the envelope echoed by the service, which carries the template id.
    ///
    /// # Errors
    ///
    /// Returns an error on encoding or network failure, on an undecodable response and
    /// on any status other than `201 Created`.
    pub async fn create_template(&self, spec: &TemplateSpec) -> Result<Envelope, TwalletError> {
        let url = self.inner.config.endpoint(TEMPLATES_PATH);
        let body = encode(&TemplatePayload::new(spec))?;
        let response = self
            .inner
            .request
            .send(Method::POST, &url, &self.inner.access_token, Some(body))
            .await?;

        expect_status("CreateVCItem", &response, STATUS_CREATED)
    }

    /// Issues a card instance of template `template_id` (the numeric template id, not
    /// its serial number).
    ///
    /// When `on_activated` is given, an activation session is started in the
    /// background and the call returns without waiting for it. The callback is invoked
    /// with the activation correlation id once the holder has scanned the card.
    ///
    /// # Errors
    ///
    /// Returns an error on encoding or network failure, on an undecodable response, on
    /// any status other than `201 Created`, and when a session was requested outside a
    /// tokio runtime.
    pub async fn create_instance(
        &self,
        template_id: i64,
        fields: &[InstanceFieldValue],
        on_activated: Option<ActivationCallback>,
    ) -> Result<IssuedInstance, TwalletError> {
        let url = self.inner.config.endpoint(INSTANCES_PATH);
        let body = encode(&InstancePayload {
            vc_id: template_id,
            fields,
        })?;
        let response = self
            .inner
            .request
            .send(Method::POST, &url, &self.inner.access_token, Some(body))
            .await?;

        expect_status("CreateVCItemData", &response, STATUS_CREATED)?;
        let record: InstanceRecord = decode_typed(&response)?;

        let activation = match on_activated {
            Some(callback) => Some(
                ActivationPoller::new(
                    Arc::clone(&self.inner),
                    record.id,
                    self.inner.config.polling,
                )
                .spawn(callback)?,
            ),
            None => None,
        };

        Ok(IssuedInstance { record, activation })
    }

    /// Returns the activation correlation id of an instance, or `None` while the
    /// holder has not activated it.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, on an undecodable response and on any
    /// status other than `200 OK`.
    pub async fn fetch_status(&self, instance_id: i64) -> Result<Option<String>, TwalletError> {
        self.inner.fetch_status(instance_id).await
    }
}
