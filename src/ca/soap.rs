//! SOAP-over-HTTPS client for the vendor's order and query APIs.

use log::{debug, warn};
use reqwest::StatusCode;

use super::{
    CaError, CertificateAuthority,
    http::{HttpClient, status_error},
    types::{
        Contact, ModifyOrderRequest, OrderQuery, OrderResponse, OrganizationInfo,
        QueryResponse, QuickOrderRequest, ReissueRequest,
    },
    xml::{self, XmlNode, escape_text},
};
use crate::config::PluginConfig;

pub const ORDER_URL_TEST: &str = "https://test-api.geotrust.com/webtrust/order.jws";
pub const ORDER_URL_PRODUCTION: &str = "https://api.geotrust.com/webtrust/order.jws";
pub const QUERY_URL_TEST: &str = "https://test-api.ws.symantec.com/webtrust/query.jws";
pub const QUERY_URL_PRODUCTION: &str = "https://api.ws.symantec.com/webtrust/query.jws";

const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const ORDER_NS: &str = "http://api.geotrust.com/webtrust/order";
const QUERY_NS: &str = "http://api.geotrust.com/webtrust/query";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Api {
    Order,
    Query,
}

impl Api {
    fn namespace(self) -> &'static str {
        match self {
            Api::Order => ORDER_NS,
            Api::Query => QUERY_NS,
        }
    }
}

pub struct SoapClient {
    config: PluginConfig,
    order_url: String,
    query_url: String,
}

impl SoapClient {
    pub fn new(config: PluginConfig) -> Self {
        let (default_order, default_query) = if config.test_mode {
            (ORDER_URL_TEST, QUERY_URL_TEST)
        } else {
            (ORDER_URL_PRODUCTION, QUERY_URL_PRODUCTION)
        };
        let order_url = config
            .order_endpoint
            .clone()
            .unwrap_or_else(|| default_order.to_string());
        let query_url = config
            .query_endpoint
            .clone()
            .unwrap_or_else(|| default_query.to_string());
        Self {
            config,
            order_url,
            query_url,
        }
    }

    pub fn order_url(&self) -> &str {
        &self.order_url
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    fn call(&self, api: Api, operation: &str, envelope: String) -> Result<XmlNode, CaError> {
        let url = match api {
            Api::Order => &self.order_url,
            Api::Query => &self.query_url,
        };
        debug!("[symantec-soap] {operation} -> {url}");

        let response = HttpClient::shared()
            .post(url.as_str())
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(envelope)
            .send()
            .map_err(|err| CaError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| CaError::Transport(format!("failed to read response body: {err}")))?;

        let result = interpret_response(status, &body);
        if let Err(err) = &result {
            warn!("[symantec-soap] {operation} failed: {err}");
        }
        result
    }

    fn request_header(
        &self,
        envelope: &mut Envelope,
        api: Api,
        product_code: Option<&str>,
        partner_order_id: Option<&str>,
        replay_token: Option<&str>,
    ) {
        let tag = match api {
            Api::Order => "OrderRequestHeader",
            Api::Query => "QueryRequestHeader",
        };
        envelope.open(tag);
        envelope.field("PartnerCode", Some(&self.config.partner_code));
        envelope.open("AuthToken");
        envelope.field("UserName", Some(&self.config.username));
        envelope.field("Password", Some(self.config.password.as_str()));
        envelope.close("AuthToken");
        envelope.field("ApiVersion", self.config.api_version.as_deref());
        if api == Api::Order {
            envelope.field("ProductCode", product_code);
            envelope.field("PartnerOrderID", partner_order_id);
        }
        if let Some(token) = replay_token {
            envelope.field("ReplayToken", Some(token));
            envelope.flag("UseReplayToken", true);
        }
        envelope.close(tag);
    }

    pub(crate) fn quick_order_envelope(&self, request: &QuickOrderRequest) -> String {
        let mut envelope = Envelope::begin(Api::Order, "QuickOrder");
        self.request_header(
            &mut envelope,
            Api::Order,
            Some(request.product_code.as_str()),
            Some(request.partner_order_id.as_str()),
            request.replay_token.as_deref(),
        );
        write_organization(&mut envelope, &request.organization);
        envelope.open("OrderParameters");
        for (key, value) in &request.parameters {
            envelope.field(key, Some(value));
        }
        envelope.close("OrderParameters");
        write_contact(&mut envelope, "AdminContact", &request.admin_contact);
        write_contact(&mut envelope, "TechContact", &request.tech_contact);
        write_contact(&mut envelope, "BillingContact", &request.billing_contact);
        envelope.field("ApproverEmail", Some(&request.approver_email));
        envelope.finish()
    }

    pub(crate) fn order_query_envelope(&self, query: &OrderQuery) -> String {
        let mut envelope = Envelope::begin(Api::Query, "GetOrderByPartnerOrderID");
        self.request_header(
            &mut envelope,
            Api::Query,
            None,
            None,
            query.replay_token.as_deref(),
        );
        envelope.field("PartnerOrderID", Some(&query.partner_order_id));
        envelope.open("OrderQueryOptions");
        envelope.flag("ReturnCertificateInfo", query.return_certificate_info);
        envelope.flag("ReturnFulfillment", query.return_fulfillment);
        envelope.flag("ReturnCACerts", query.return_ca_certs);
        envelope.close("OrderQueryOptions");
        envelope.finish()
    }

    pub(crate) fn modify_order_envelope(&self, request: &ModifyOrderRequest) -> String {
        let mut envelope = Envelope::begin(Api::Order, "ModifyOrder");
        self.request_header(
            &mut envelope,
            Api::Order,
            None,
            Some(request.partner_order_id.as_str()),
            request.replay_token.as_deref(),
        );
        envelope.field("ModifyOrderOperation", Some(request.operation.as_str()));
        envelope.field("ModifyOrderReasonMessage", request.reason.as_deref());
        envelope.field("RequestorEmail", request.requestor_email.as_deref());
        envelope.finish()
    }

    pub(crate) fn reissue_envelope(&self, request: &ReissueRequest) -> String {
        let mut envelope = Envelope::begin(Api::Order, "Reissue");
        self.request_header(
            &mut envelope,
            Api::Order,
            None,
            request.partner_order_id.as_deref(),
            request.replay_token.as_deref(),
        );
        envelope.open("OrderParameters");
        envelope.field("CSR", Some(&request.csr));
        envelope.field(
            "SignatureHashAlgorithm",
            request.signature_hash_algorithm.as_deref(),
        );
        envelope.field(
            "OriginalPartnerOrderID",
            Some(&request.original_partner_order_id),
        );
        envelope.close("OrderParameters");
        envelope.field("ReissueEmail", Some(&request.reissue_email));
        if !request.order_changes.is_empty() {
            envelope.open("OrderChanges");
            for change in &request.order_changes {
                envelope.open("Change");
                envelope.field("ChangeType", Some(&change.change_type));
                envelope.field("NewValue", change.new_value.as_deref());
                envelope.field("OldValue", change.old_value.as_deref());
                envelope.close("Change");
            }
            envelope.close("OrderChanges");
        }
        envelope.finish()
    }
}

impl CertificateAuthority for SoapClient {
    fn quick_order(&self, request: &QuickOrderRequest) -> Result<OrderResponse, CaError> {
        let body = self.call(Api::Order, "QuickOrder", self.quick_order_envelope(request))?;
        OrderResponse::from_xml(&body)
    }

    fn get_order_by_partner_order_id(&self, query: &OrderQuery) -> Result<QueryResponse, CaError> {
        let body = self.call(
            Api::Query,
            "GetOrderByPartnerOrderID",
            self.order_query_envelope(query),
        )?;
        QueryResponse::from_xml(&body)
    }

    fn modify_order(&self, request: &ModifyOrderRequest) -> Result<OrderResponse, CaError> {
        let body = self.call(Api::Order, "ModifyOrder", self.modify_order_envelope(request))?;
        OrderResponse::from_xml(&body)
    }

    fn reissue(&self, request: &ReissueRequest) -> Result<OrderResponse, CaError> {
        let body = self.call(Api::Order, "Reissue", self.reissue_envelope(request))?;
        OrderResponse::from_xml(&body)
    }
}

/// Maps an HTTP exchange to the SOAP body, surfacing faults first since the
/// vendor sends them with a 500 status.
fn interpret_response(status: StatusCode, body: &str) -> Result<XmlNode, CaError> {
    let parsed = if body.trim().is_empty() {
        None
    } else {
        Some(xml::parse(body))
    };

    if let Some(Ok(document)) = &parsed {
        if let Some(fault) = document.find("Fault") {
            let message = fault
                .child_text("faultstring")
                .or_else(|| fault.child_text("faultcode"))
                .unwrap_or_else(|| "unspecified SOAP fault".to_string());
            return Err(CaError::Fault(message));
        }
    }

    if !status.is_success() {
        return Err(status_error(status, Some(body.to_string())));
    }

    let document = parsed.ok_or_else(|| CaError::Malformed("empty response body".to_string()))??;
    document
        .find("Body")
        .cloned()
        .ok_or_else(|| CaError::Malformed("missing SOAP Body".to_string()))
}

fn write_organization(envelope: &mut Envelope, organization: &OrganizationInfo) {
    envelope.open("OrganizationInfo");
    envelope.field("OrganizationName", organization.name.as_deref());
    envelope.open("OrganizationAddress");
    envelope.field("AddressLine1", organization.address_line1.as_deref());
    envelope.field("AddressLine2", organization.address_line2.as_deref());
    envelope.field("AddressLine3", organization.address_line3.as_deref());
    envelope.field("City", organization.city.as_deref());
    envelope.field("Region", organization.region.as_deref());
    envelope.field("PostalCode", organization.postal_code.as_deref());
    envelope.field("Country", organization.country.as_deref());
    envelope.field("Phone", organization.phone.as_deref());
    envelope.field("Fax", organization.fax.as_deref());
    envelope.close("OrganizationAddress");
    envelope.close("OrganizationInfo");
}

fn write_contact(envelope: &mut Envelope, tag: &str, contact: &Contact) {
    envelope.open(tag);
    envelope.field("FirstName", contact.first_name.as_deref());
    envelope.field("LastName", contact.last_name.as_deref());
    envelope.field("Phone", contact.phone.as_deref());
    envelope.field("Fax", contact.fax.as_deref());
    envelope.field("Email", contact.email.as_deref());
    envelope.field("Title", contact.title.as_deref());
    envelope.field("OrganizationName", contact.organization_name.as_deref());
    envelope.field("AddressLine1", contact.address_line1.as_deref());
    envelope.field("AddressLine2", contact.address_line2.as_deref());
    envelope.field("City", contact.city.as_deref());
    envelope.field("Region", contact.region.as_deref());
    envelope.field("PostalCode", contact.postal_code.as_deref());
    envelope.field("Country", contact.country.as_deref());
    envelope.close(tag);
}

struct Envelope {
    operation: &'static str,
    out: String,
}

impl Envelope {
    fn begin(api: Api, operation: &'static str) -> Self {
        let mut out = String::with_capacity(2048);
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        out.push_str(&format!(
            r#"<soapenv:Envelope xmlns:soapenv="{SOAP_ENV_NS}" xmlns:api="{}"><soapenv:Header/><soapenv:Body><api:{operation}><api:Request>"#,
            api.namespace()
        ));
        Self { operation, out }
    }

    fn open(&mut self, tag: &str) {
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn close(&mut self, tag: &str) {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    /// Writes `<tag>value</tag>`; absent values are omitted entirely.
    fn field<S: AsRef<str>>(&mut self, tag: &str, value: Option<S>) {
        if let Some(value) = value {
            self.open(tag);
            self.out.push_str(&escape_text(value.as_ref()));
            self.close(tag);
        }
    }

    fn flag(&mut self, tag: &str, value: bool) {
        self.field(tag, Some(if value { "true" } else { "false" }));
    }

    fn finish(mut self) -> String {
        self.out.push_str(&format!(
            "</api:Request></api:{}></soapenv:Body></soapenv:Envelope>",
            self.operation
        ));
        self.out
    }
}
