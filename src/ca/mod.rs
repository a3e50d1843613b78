use thiserror::Error;

pub(crate) mod http;
pub mod soap;
pub mod types;
pub(crate) mod xml;

pub use soap::SoapClient;
pub use types::{
    CaCertificate, CertificateInfo, Contact, DnsAuthDetails, FileAuthDetails, Fulfillment,
    ModifyOrderOperation, ModifyOrderRequest, OrderChange, OrderDetail, OrderInfo, OrderQuery,
    OrderResponse, OrderResponseHeader, OrganizationInfo, QueryResponse, QueryResponseHeader,
    QuickOrderRequest, ReissueRequest, VendorError,
};

/// Vendor operations the plugin relies on.
///
/// Implementations only report transport-level failures as `Err`; a request
/// the vendor rejected comes back as `Ok` with a negative success code.
pub trait CertificateAuthority: Send + Sync {
    fn quick_order(&self, request: &QuickOrderRequest) -> Result<OrderResponse, CaError>;
    fn get_order_by_partner_order_id(&self, query: &OrderQuery) -> Result<QueryResponse, CaError>;
    fn modify_order(&self, request: &ModifyOrderRequest) -> Result<OrderResponse, CaError>;
    fn reissue(&self, request: &ReissueRequest) -> Result<OrderResponse, CaError>;
}

#[derive(Error, Debug)]
pub enum CaError {
    #[error("CA request failed: {0}")]
    Transport(String),
    #[error("CA returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("CA fault: {0}")]
    Fault(String),
    #[error("malformed CA response: {0}")]
    Malformed(String),
}
