use serde::{Deserialize, Serialize};

/// Status values the host understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    WaitingForCa,
    CaUnavailableForRequest,
    ClientDataIssueSeen,
    CertificateGenerated,
    RequestCanceled,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::WaitingForCa => "WAITING_FOR_CA",
            CertificateStatus::CaUnavailableForRequest => "CA_UNAVAILABLE_FOR_REQUEST",
            CertificateStatus::ClientDataIssueSeen => "CLIENT_DATA_ISSUE_SEEN",
            CertificateStatus::CertificateGenerated => "CERTIFICATE_GENERATED",
            CertificateStatus::RequestCanceled => "REQUEST_CANCELED",
        }
    }
}

/// Finer-grained outcome of a status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSubStatus {
    Issued,
    PendingReissue,
    Cancelled,
    NotYetIssued,
    InvalidOrder,
    Unreadable,
    Unreachable,
}

impl OrderSubStatus {
    /// Message surfaced to the host alongside the sub-status.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            OrderSubStatus::Issued => None,
            OrderSubStatus::PendingReissue => Some("PENDING_REISSUE"),
            OrderSubStatus::Cancelled => Some("CANCELLED"),
            OrderSubStatus::NotYetIssued => Some("Certificate not yet issued"),
            OrderSubStatus::InvalidOrder => Some("Invalid order ID"),
            OrderSubStatus::Unreadable => Some("Cannot fetch order Status"),
            OrderSubStatus::Unreachable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainCertificateKind {
    Intermediate,
    Root,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCertificate {
    #[serde(rename = "type")]
    pub kind: ChainCertificateKind,
    pub cert: String,
}

/// Outcome of one adapter operation, handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDto {
    pub status: CertificateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intermediates: Vec<ChainCertificate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_status: Option<OrderSubStatus>,
    #[serde(default)]
    pub can_retry: bool,
}

impl ResultDto {
    pub fn new(status: CertificateStatus) -> Self {
        Self {
            status,
            status_message: None,
            certificate: None,
            intermediates: Vec::new(),
            sub_status: None,
            can_retry: false,
        }
    }

    /// A failed operation with a user-facing message.
    pub fn failure(status: CertificateStatus, message: impl Into<String>, can_retry: bool) -> Self {
        Self {
            status_message: Some(message.into()),
            can_retry,
            ..Self::new(status)
        }
    }

    /// Result of a status check, with the message implied by the sub-status.
    pub fn with_sub_status(status: CertificateStatus, sub_status: OrderSubStatus) -> Self {
        Self {
            status_message: sub_status.message().map(str::to_string),
            sub_status: Some(sub_status),
            ..Self::new(status)
        }
    }

    pub fn retryable(mut self, can_retry: bool) -> Self {
        self.can_retry = can_retry;
        self
    }

    pub fn issued(certificate: String, intermediates: Vec<ChainCertificate>) -> Self {
        Self {
            certificate: Some(certificate),
            intermediates,
            ..Self::with_sub_status(CertificateStatus::CertificateGenerated, OrderSubStatus::Issued)
        }
    }
}
