//! Typed views over the loosely-typed metadata maps the host passes in.
//!
//! Order metadata is read once at the boundary; the lifecycle code only ever
//! sees the structs defined here.

use std::collections::BTreeMap;

use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::ca::{Contact, OrderChange, OrganizationInfo, QuickOrderRequest, ReissueRequest};

/// Caller-supplied order fields.
pub type OrderMeta = serde_json::Map<String, Value>;

/// Vendor bookkeeping persisted between calls for one order.
pub type PluginMeta = BTreeMap<String, String>;

/// Keys written into [`PluginMeta`].
pub mod keys {
    pub const GEOTRUST_ORDER_ID: &str = "GeoTrustOrderID";
    pub const PARTNER_ORDER_ID: &str = "PartnerOrderID";
    pub const CSR: &str = "CSR";
    pub const PRODUCT_CODE: &str = "ProductCode";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const DNS_ENTRY: &str = "DNSEntry";
    pub const FILE_NAME: &str = "FileName";
    pub const FILE_CONTENTS: &str = "FileContents";
}

/// Order metadata keys forwarded to the vendor as `OrderParameters`.
///
/// Other vendor order parameters are never sent. `ReissueEmail` only
/// applies to reissues.
pub const ORDER_PARAMETER_KEYS: &[&str] = &[
    "ValidityPeriod",
    "ServerCount",
    "WebServerType",
    "DomainName",
    "SignatureHashAlgorithm",
    "DVAuthMethod",
    "SpecialInstructions",
    "RenewalIndicator",
];

/// Keys consumed while building the request itself rather than forwarded.
const STRUCTURAL_KEYS: &[&str] = &[
    "ProductCode",
    "ApproverEmail",
    "CSR",
    "TechSameAsAdmin",
    "BillSameAsAdmin",
    "OrganizationName",
    "AddressLine1",
    "AddressLine2",
    "AddressLine3",
    "City",
    "Region",
    "PostalCode",
    "Country",
    "OrganizationPhone",
    "Phone",
    "Fax",
    "ReplayToken",
];

const CONTACT_PREFIXES: &[&str] = &["AdminContact", "TechContact", "BillingContact"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} has an unsupported value: {reason}")]
    Invalid { field: String, reason: String },
}

/// Domain validation method requested for a DV product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DvAuthMethod {
    Dns,
    File,
    Other(String),
}

impl DvAuthMethod {
    fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("DNS") {
            DvAuthMethod::Dns
        } else if raw.eq_ignore_ascii_case("FILE") {
            DvAuthMethod::File
        } else {
            DvAuthMethod::Other(raw.to_string())
        }
    }
}

/// Everything a `QuickOrder` needs, validated from order metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub product_code: String,
    pub approver_email: String,
    pub csr: String,
    pub organization: OrganizationInfo,
    pub admin_contact: Contact,
    pub tech_contact: Contact,
    pub billing_contact: Contact,
    pub dv_auth_method: Option<DvAuthMethod>,
    pub parameters: BTreeMap<String, String>,
    pub replay_token: Option<String>,
}

impl OrderRequest {
    pub fn from_meta(meta: &OrderMeta) -> Result<Self, MetaError> {
        let product_code = required_text(meta, "ProductCode")?;
        let approver_email = required_text(meta, "ApproverEmail")?;
        let csr = required_text(meta, "CSR")?;

        let admin_contact = contact(meta, "AdminContact")?;
        let tech_contact = if flag(meta, "TechSameAsAdmin")? {
            admin_contact.clone()
        } else {
            contact(meta, "TechContact")?
        };
        let billing_contact = if flag(meta, "BillSameAsAdmin")? {
            admin_contact.clone()
        } else {
            contact(meta, "BillingContact")?
        };

        let mut parameters = BTreeMap::new();
        for key in ORDER_PARAMETER_KEYS {
            if let Some(value) = text(meta, key)? {
                parameters.insert((*key).to_string(), value);
            }
        }
        parameters.insert("CSR".to_string(), csr.clone());

        for key in meta.keys() {
            let known = ORDER_PARAMETER_KEYS.contains(&key.as_str())
                || STRUCTURAL_KEYS.contains(&key.as_str())
                || CONTACT_PREFIXES.iter().any(|prefix| key.starts_with(prefix));
            if !known {
                debug!("[symantec-plugin] ignoring unrecognised order field {key}");
            }
        }

        let dv_auth_method = parameters
            .get("DVAuthMethod")
            .map(|raw| DvAuthMethod::parse(raw));

        Ok(Self {
            product_code,
            approver_email,
            csr,
            organization: organization(meta)?,
            admin_contact,
            tech_contact,
            billing_contact,
            dv_auth_method,
            parameters,
            replay_token: text(meta, "ReplayToken")?,
        })
    }

    pub fn to_quick_order(&self, order_id: &str) -> QuickOrderRequest {
        QuickOrderRequest {
            partner_order_id: order_id.to_string(),
            product_code: self.product_code.clone(),
            approver_email: self.approver_email.clone(),
            organization: self.organization.clone(),
            admin_contact: self.admin_contact.clone(),
            tech_contact: self.tech_contact.clone(),
            billing_contact: self.billing_contact.clone(),
            parameters: self.parameters.clone(),
            replay_token: self.replay_token.clone(),
        }
    }
}

/// Fields read from order metadata for a reissue.
#[derive(Debug, Clone, PartialEq)]
pub struct ReissueFields {
    /// New partner order id for the reissued certificate.
    pub partner_order_id: Option<String>,
    pub reissue_email: String,
    pub csr: Option<String>,
    pub signature_hash_algorithm: Option<String>,
    pub order_changes: Vec<OrderChange>,
    pub replay_token: Option<String>,
}

impl ReissueFields {
    pub fn from_meta(meta: &OrderMeta) -> Result<Self, MetaError> {
        let order_changes = match meta.get("OrderChanges") {
            None | Some(Value::Null) => Vec::new(),
            Some(value @ Value::Array(_)) => serde_json::from_value(value.clone())
                .map_err(|err| invalid("OrderChanges", err.to_string()))?,
            Some(value @ Value::Object(_)) => vec![
                serde_json::from_value(value.clone())
                    .map_err(|err| invalid("OrderChanges", err.to_string()))?,
            ],
            Some(_) => return Err(invalid("OrderChanges", "expected a list of changes")),
        };
        Ok(Self {
            partner_order_id: text(meta, "PartnerOrderID")?,
            reissue_email: required_text(meta, "ReissueEmail")?,
            csr: text(meta, "CSR")?,
            signature_hash_algorithm: text(meta, "SignatureHashAlgorithm")?,
            order_changes,
            replay_token: text(meta, "ReplayToken")?,
        })
    }

    /// Builds the vendor request, preferring the CSR supplied with this call.
    pub fn into_request(
        self,
        order_id: &str,
        fallback_csr: Option<&str>,
    ) -> Result<ReissueRequest, MetaError> {
        let csr = self
            .csr
            .or_else(|| fallback_csr.map(str::to_string))
            .ok_or(MetaError::Missing("CSR"))?;
        Ok(ReissueRequest {
            partner_order_id: self.partner_order_id,
            original_partner_order_id: order_id.to_string(),
            reissue_email: self.reissue_email,
            csr,
            signature_hash_algorithm: self.signature_hash_algorithm,
            order_changes: self.order_changes,
            replay_token: self.replay_token,
        })
    }
}

fn organization(meta: &OrderMeta) -> Result<OrganizationInfo, MetaError> {
    let phone = match text(meta, "OrganizationPhone")? {
        Some(phone) => Some(phone),
        None => text(meta, "Phone")?,
    };
    Ok(OrganizationInfo {
        name: text(meta, "OrganizationName")?,
        address_line1: text(meta, "AddressLine1")?,
        address_line2: text(meta, "AddressLine2")?,
        address_line3: text(meta, "AddressLine3")?,
        city: text(meta, "City")?,
        region: text(meta, "Region")?,
        postal_code: text(meta, "PostalCode")?,
        country: text(meta, "Country")?,
        phone,
        fax: text(meta, "Fax")?,
    })
}

fn contact(meta: &OrderMeta, prefix: &str) -> Result<Contact, MetaError> {
    let field = |name: &str| text(meta, &format!("{prefix}{name}"));
    Ok(Contact {
        first_name: field("FirstName")?,
        last_name: field("LastName")?,
        phone: field("Phone")?,
        email: field("Email")?,
        title: field("Title")?,
        organization_name: field("OrganizationName")?,
        address_line1: field("AddressLine1")?,
        address_line2: field("AddressLine2")?,
        city: field("City")?,
        region: field("Region")?,
        postal_code: field("PostalCode")?,
        country: field("Country")?,
        fax: field("Fax")?,
    })
}

fn invalid(field: &str, reason: impl Into<String>) -> MetaError {
    MetaError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Scalar metadata as text; blank strings count as absent.
fn text(meta: &OrderMeta, key: &str) -> Result<Option<String>, MetaError> {
    match meta.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(Value::Bool(value)) => Ok(Some(value.to_string())),
        Some(_) => Err(invalid(key, "expected a scalar value")),
    }
}

fn required_text(meta: &OrderMeta, key: &'static str) -> Result<String, MetaError> {
    text(meta, key)?.ok_or(MetaError::Missing(key))
}

fn flag(meta: &OrderMeta, key: &str) -> Result<bool, MetaError> {
    match meta.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(value)) => Ok(*value),
        Some(Value::String(value)) => Ok(value.trim().eq_ignore_ascii_case("true")),
        Some(_) => Err(invalid(key, "expected true or false")),
    }
}
