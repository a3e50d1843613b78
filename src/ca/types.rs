//! Request and response shapes for the vendor operations the plugin calls.
//!
//! These cover only the fields the order lifecycle needs; they are not a
//! reproduction of the vendor's WSDL.

use std::{collections::BTreeMap, fmt};

use serde::Deserialize;

use super::{CaError, xml::XmlNode};

/// Contact block used for admin, tech and billing contacts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub organization_name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub fax: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationInfo {
    pub name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub address_line3: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuickOrderRequest {
    pub partner_order_id: String,
    pub product_code: String,
    pub approver_email: String,
    pub organization: OrganizationInfo,
    pub admin_contact: Contact,
    pub tech_contact: Contact,
    pub billing_contact: Contact,
    /// Vendor `OrderParameters`, including the CSR.
    pub parameters: BTreeMap<String, String>,
    /// Sent with `UseReplayToken` so the vendor answers a resent request
    /// with the original outcome.
    pub replay_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuery {
    pub partner_order_id: String,
    pub return_certificate_info: bool,
    pub return_fulfillment: bool,
    pub return_ca_certs: bool,
    pub replay_token: Option<String>,
}

impl OrderQuery {
    /// Query that returns everything needed to hand out a finished certificate.
    pub fn with_certificates(partner_order_id: &str) -> Self {
        Self {
            partner_order_id: partner_order_id.to_string(),
            return_certificate_info: true,
            return_fulfillment: true,
            return_ca_certs: true,
            replay_token: None,
        }
    }
}

/// Operation codes accepted by the vendor's `ModifyOrder` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOrderOperation {
    Approve,
    ResellerApprove,
    ResellerDisapprove,
    ApproveEssl,
    Reject,
    Cancel,
    Deactivate,
    UpdatePostStatus,
    RequestOnDemandScan,
    UpdateSealPreferences,
}

impl ModifyOrderOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifyOrderOperation::Approve => "APPROVE",
            ModifyOrderOperation::ResellerApprove => "RESELLER_APPROVE",
            ModifyOrderOperation::ResellerDisapprove => "RESELLER_DISAPPROVE",
            ModifyOrderOperation::ApproveEssl => "APPROVE_ESSL",
            ModifyOrderOperation::Reject => "REJECT",
            ModifyOrderOperation::Cancel => "CANCEL",
            ModifyOrderOperation::Deactivate => "DEACTIVATE",
            ModifyOrderOperation::UpdatePostStatus => "UPDATE_POST_STATUS",
            ModifyOrderOperation::RequestOnDemandScan => "REQUEST_ON_DEMAND_SCAN",
            ModifyOrderOperation::UpdateSealPreferences => "UPDATE_SEAL_PREFERENCES",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifyOrderRequest {
    pub partner_order_id: String,
    pub operation: ModifyOrderOperation,
    pub reason: Option<String>,
    pub requestor_email: Option<String>,
    pub replay_token: Option<String>,
}

/// A single SAN/common-name edit carried by a reissue.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderChange {
    pub change_type: String,
    #[serde(default)]
    pub new_value: Option<String>,
    #[serde(default)]
    pub old_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReissueRequest {
    /// Fresh partner order id for the reissue; the vendor assigns one when absent.
    pub partner_order_id: Option<String>,
    /// The order being reissued.
    pub original_partner_order_id: String,
    pub reissue_email: String,
    pub csr: String,
    pub signature_hash_algorithm: Option<String>,
    pub order_changes: Vec<OrderChange>,
    pub replay_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorError {
    pub code: Option<String>,
    pub field: Option<String>,
    pub message: Option<String>,
}

impl fmt::Display for VendorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code.as_deref().unwrap_or("?");
        match &self.field {
            Some(field) => write!(f, "{code} {field}: ")?,
            None => write!(f, "{code}: ")?,
        }
        f.write_str(self.message.as_deref().unwrap_or("unknown error"))
    }
}

/// Renders an `Errors` block the way it is surfaced to end users.
pub fn render_errors(errors: &[VendorError]) -> String {
    if errors.is_empty() {
        return "CA reported an unspecified error".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderResponseHeader {
    pub partner_order_id: Option<String>,
    pub success_code: i32,
    pub errors: Vec<VendorError>,
    pub timestamp: Option<String>,
}

impl OrderResponseHeader {
    pub fn succeeded(&self) -> bool {
        self.success_code >= 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DnsAuthDetails {
    pub dns_entry: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileAuthDetails {
    pub file_name: Option<String>,
    pub file_contents: Option<String>,
}

/// Response shared by QuickOrder, ModifyOrder and Reissue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderResponse {
    pub header: OrderResponseHeader,
    pub geotrust_order_id: Option<String>,
    pub dns_auth: Option<DnsAuthDetails>,
    pub file_auth: Option<FileAuthDetails>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponseHeader {
    pub success_code: i32,
    pub return_count: u32,
    pub errors: Vec<VendorError>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderInfo {
    pub partner_order_id: Option<String>,
    pub geotrust_order_id: Option<String>,
    pub domain_name: Option<String>,
    pub order_state: Option<String>,
    pub order_status_major: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificateInfo {
    pub certificate_status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaCertificate {
    /// `INTERMEDIATE`, `ROOT`, or whatever else the vendor sends.
    pub kind: String,
    pub cert: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fulfillment {
    pub server_certificate: Option<String>,
    pub ca_certificates: Vec<CaCertificate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderDetail {
    pub order_info: OrderInfo,
    pub certificate_info: Option<CertificateInfo>,
    pub fulfillment: Option<Fulfillment>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub header: QueryResponseHeader,
    pub order_detail: Option<OrderDetail>,
}

fn required<'a>(node: &'a XmlNode, name: &str) -> Result<&'a XmlNode, CaError> {
    node.find(name)
        .ok_or_else(|| CaError::Malformed(format!("missing {name}")))
}

fn parse_number<T: std::str::FromStr>(node: &XmlNode, name: &str) -> Result<T, CaError> {
    let raw = node
        .child_text(name)
        .ok_or_else(|| CaError::Malformed(format!("missing {name}")))?;
    raw.parse()
        .map_err(|_| CaError::Malformed(format!("{name} is not a number: {raw}")))
}

fn parse_errors(header: &XmlNode) -> Vec<VendorError> {
    let Some(errors) = header.child("Errors") else {
        return Vec::new();
    };
    errors
        .children_named("Error")
        .map(|error| VendorError {
            code: error.child_text("ErrorCode"),
            field: error.child_text("ErrorField"),
            message: error.child_text("ErrorMessage"),
        })
        .collect()
}

impl OrderResponse {
    pub(crate) fn from_xml(body: &XmlNode) -> Result<Self, CaError> {
        let header = required(body, "OrderResponseHeader")?;
        let geotrust_order_id = body
            .find("GeoTrustOrderID")
            .map(|node| node.text.trim().to_string())
            .filter(|id| !id.is_empty());
        Ok(Self {
            header: OrderResponseHeader {
                partner_order_id: header.child_text("PartnerOrderID"),
                success_code: parse_number(header, "SuccessCode")?,
                errors: parse_errors(header),
                timestamp: header.child_text("Timestamp"),
            },
            geotrust_order_id,
            dns_auth: body.find("DNSAuthDVDetails").map(|node| DnsAuthDetails {
                dns_entry: node.child_text("DNSEntry"),
            }),
            file_auth: body.find("FileAuthDVDetails").map(|node| FileAuthDetails {
                file_name: node.child_text("FileName"),
                file_contents: node.child_text("FileContents"),
            }),
        })
    }
}

impl QueryResponse {
    pub(crate) fn from_xml(body: &XmlNode) -> Result<Self, CaError> {
        let header = required(body, "QueryResponseHeader")?;
        let return_count = match header.child_text("ReturnCount") {
            Some(_) => parse_number(header, "ReturnCount")?,
            None => 0,
        };
        Ok(Self {
            header: QueryResponseHeader {
                success_code: parse_number(header, "SuccessCode")?,
                return_count,
                errors: parse_errors(header),
                timestamp: header.child_text("Timestamp"),
            },
            order_detail: body.find("OrderDetail").map(parse_order_detail),
        })
    }
}

fn parse_order_detail(detail: &XmlNode) -> OrderDetail {
    let order_info = detail
        .child("OrderInfo")
        .map(|info| OrderInfo {
            partner_order_id: info.child_text("PartnerOrderID"),
            geotrust_order_id: info.child_text("GeoTrustOrderID"),
            domain_name: info.child_text("DomainName"),
            order_state: info.child_text("OrderState"),
            order_status_major: info.child_text("OrderStatusMajor"),
        })
        .unwrap_or_default();
    let certificate_info = detail.child("CertificateInfo").map(|info| CertificateInfo {
        certificate_status: info.child_text("CertificateStatus"),
        start_date: info.child_text("StartDate"),
        end_date: info.child_text("EndDate"),
    });
    let fulfillment = detail.child("Fulfillment").map(|fulfillment| Fulfillment {
        server_certificate: fulfillment.child_text("ServerCertificate"),
        ca_certificates: fulfillment
            .child("CACertificates")
            .map(|certs| {
                certs
                    .children_named("CACertificate")
                    .filter_map(|entry| {
                        Some(CaCertificate {
                            kind: entry.child_text("Type")?,
                            cert: entry.child_text("CACert")?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default(),
    });
    OrderDetail {
        order_info,
        certificate_info,
        fulfillment,
    }
}
