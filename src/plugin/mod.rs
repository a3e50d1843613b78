//! Order lifecycle adapter: turns vendor call outcomes into host results.

use log::{debug, info, warn};

use crate::ca::{
    CaError, CertificateAuthority, ModifyOrderOperation, ModifyOrderRequest, OrderQuery, OrderResponse,
    QueryResponse, SoapClient, types::render_errors,
};
use crate::config::PluginConfig;

pub mod meta;
pub mod status;

pub use meta::{DvAuthMethod, MetaError, OrderMeta, OrderRequest, PluginMeta, ReissueFields, keys};
pub use status::{
    CertificateStatus, ChainCertificate, ChainCertificateKind, OrderSubStatus, ResultDto,
};

pub const DEFAULT_CA_NAME: &str = "Symantec CA";

/// Operations the host service drives an order through.
///
/// Every operation returns a [`ResultDto`]; failures are reported through
/// its status, never as a panic or an error value.
pub trait CertificatePlugin {
    fn default_ca_name(&self) -> &str;

    fn default_signing_cert(&self) -> Option<String> {
        None
    }

    fn default_intermediates(&self) -> Option<Vec<ChainCertificate>> {
        None
    }

    fn supports(&self, certificate_spec: &OrderMeta) -> bool;

    fn issue_certificate_request(
        &self,
        order_id: &str,
        order_meta: &OrderMeta,
        plugin_meta: &mut PluginMeta,
    ) -> ResultDto;

    fn modify_certificate_request(
        &self,
        order_id: &str,
        order_meta: &OrderMeta,
        plugin_meta: &PluginMeta,
    ) -> ResultDto;

    fn cancel_certificate_request(&self, order_id: &str) -> ResultDto;

    fn check_certificate_status(&self, order_id: &str) -> ResultDto;
}

pub struct SymantecPlugin<C> {
    ca: C,
}

impl SymantecPlugin<SoapClient> {
    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(SoapClient::new(config.clone()))
    }
}

impl<C: CertificateAuthority> SymantecPlugin<C> {
    pub fn new(ca: C) -> Self {
        Self { ca }
    }

    pub fn ca(&self) -> &C {
        &self.ca
    }
}

impl<C: CertificateAuthority> CertificatePlugin for SymantecPlugin<C> {
    fn default_ca_name(&self) -> &str {
        DEFAULT_CA_NAME
    }

    fn supports(&self, _certificate_spec: &OrderMeta) -> bool {
        true
    }

    fn issue_certificate_request(
        &self,
        order_id: &str,
        order_meta: &OrderMeta,
        plugin_meta: &mut PluginMeta,
    ) -> ResultDto {
        let unavailable = |message: String| {
            ResultDto::failure(CertificateStatus::CaUnavailableForRequest, message, false)
        };

        let request = match OrderRequest::from_meta(order_meta) {
            Ok(request) => request,
            Err(err) => {
                warn!("[symantec-plugin] order {order_id} rejected before submission: {err}");
                return unavailable(err.to_string());
            }
        };

        let response = match self.ca.quick_order(&request.to_quick_order(order_id)) {
            Ok(response) => response,
            Err(err) => {
                warn!("[symantec-plugin] order {order_id} submission failed: {err}");
                return unavailable(err.to_string());
            }
        };

        if !response.header.succeeded() {
            let message = render_errors(&response.header.errors);
            warn!(
                "[symantec-plugin] order {order_id} refused with code {}: {message}",
                response.header.success_code
            );
            return unavailable(message);
        }

        match harvest_order(order_id, &request, &response) {
            Ok(harvested) => {
                plugin_meta.extend(harvested);
                info!("[symantec-plugin] order {order_id} submitted; waiting for CA");
                ResultDto::new(CertificateStatus::WaitingForCa)
            }
            Err(reason) => {
                warn!("[symantec-plugin] order {order_id} response incomplete: {reason}");
                unavailable(reason)
            }
        }
    }

    fn modify_certificate_request(
        &self,
        order_id: &str,
        order_meta: &OrderMeta,
        plugin_meta: &PluginMeta,
    ) -> ResultDto {
        let client_issue = |message: String| {
            ResultDto::failure(CertificateStatus::ClientDataIssueSeen, message, true)
        };

        let stored_csr = plugin_meta.get(keys::CSR).map(String::as_str);
        let request = match ReissueFields::from_meta(order_meta)
            .and_then(|fields| fields.into_request(order_id, stored_csr))
        {
            Ok(request) => request,
            Err(err) => {
                warn!("[symantec-plugin] reissue of {order_id} rejected before submission: {err}");
                return client_issue(err.to_string());
            }
        };

        match self.ca.reissue(&request) {
            Ok(response) if response.header.succeeded() => {
                info!("[symantec-plugin] reissue of {order_id} accepted; waiting for CA");
                ResultDto::new(CertificateStatus::WaitingForCa)
            }
            Ok(response) => {
                let message = render_errors(&response.header.errors);
                warn!("[symantec-plugin] reissue of {order_id} refused: {message}");
                client_issue(message)
            }
            Err(err) => {
                warn!("[symantec-plugin] reissue of {order_id} failed: {err}");
                client_issue(err.to_string())
            }
        }
    }

    fn cancel_certificate_request(&self, order_id: &str) -> ResultDto {
        let request = ModifyOrderRequest {
            partner_order_id: order_id.to_string(),
            operation: ModifyOrderOperation::Cancel,
            reason: None,
            requestor_email: None,
            replay_token: None,
        };
        let failure = match self.ca.modify_order(&request) {
            Ok(response) if response.header.succeeded() => {
                info!("[symantec-plugin] order {order_id} cancelled");
                return ResultDto::new(CertificateStatus::RequestCanceled);
            }
            Ok(response) => render_errors(&response.header.errors),
            Err(err) => err.to_string(),
        };
        warn!("[symantec-plugin] cancel of {order_id} failed: {failure}");
        ResultDto::failure(CertificateStatus::CaUnavailableForRequest, failure, false)
    }

    fn check_certificate_status(&self, order_id: &str) -> ResultDto {
        let response = match self
            .ca
            .get_order_by_partner_order_id(&OrderQuery::with_certificates(order_id))
        {
            Ok(response) => response,
            Err(err @ (CaError::Transport(_) | CaError::Http { .. })) => {
                warn!("[symantec-plugin] status query for {order_id} failed: {err}");
                return ResultDto {
                    sub_status: Some(OrderSubStatus::Unreachable),
                    ..ResultDto::failure(CertificateStatus::WaitingForCa, err.to_string(), true)
                };
            }
            Err(err) => {
                warn!("[symantec-plugin] status reply for {order_id} is unusable: {err}");
                return ResultDto::with_sub_status(
                    CertificateStatus::WaitingForCa,
                    OrderSubStatus::Unreadable,
                );
            }
        };

        let result = classify_order(order_id, &response);
        debug!(
            "[symantec-plugin] order {order_id} status {} ({:?})",
            result.status.as_str(),
            result.sub_status
        );
        result
    }
}

/// Collects the fields persisted after a successful submission.
///
/// Nothing is returned unless every expected field is present, so a
/// partially-formed response never leaks into plugin metadata.
fn harvest_order(
    order_id: &str,
    request: &OrderRequest,
    response: &OrderResponse,
) -> Result<PluginMeta, String> {
    let mut harvested = PluginMeta::new();

    let geotrust_order_id = response
        .geotrust_order_id
        .clone()
        .ok_or_else(|| "CA response is missing GeoTrustOrderID".to_string())?;
    harvested.insert(keys::GEOTRUST_ORDER_ID.to_string(), geotrust_order_id);
    harvested.insert(
        keys::PARTNER_ORDER_ID.to_string(),
        response
            .header
            .partner_order_id
            .clone()
            .unwrap_or_else(|| order_id.to_string()),
    );
    harvested.insert(keys::CSR.to_string(), request.csr.clone());
    harvested.insert(keys::PRODUCT_CODE.to_string(), request.product_code.clone());
    if let Some(timestamp) = &response.header.timestamp {
        harvested.insert(keys::TIMESTAMP.to_string(), timestamp.clone());
    }

    match &request.dv_auth_method {
        Some(DvAuthMethod::Dns) => {
            let entry = response
                .dns_auth
                .as_ref()
                .and_then(|dns| dns.dns_entry.clone())
                .ok_or_else(|| "CA response is missing DNSEntry".to_string())?;
            harvested.insert(keys::DNS_ENTRY.to_string(), entry);
        }
        Some(DvAuthMethod::File) => {
            let file = response
                .file_auth
                .as_ref()
                .ok_or_else(|| "CA response is missing FileAuthDVDetails".to_string())?;
            let name = file
                .file_name
                .clone()
                .ok_or_else(|| "CA response is missing FileName".to_string())?;
            let contents = file
                .file_contents
                .clone()
                .ok_or_else(|| "CA response is missing FileContents".to_string())?;
            harvested.insert(keys::FILE_NAME.to_string(), name);
            harvested.insert(keys::FILE_CONTENTS.to_string(), contents);
        }
        Some(DvAuthMethod::Other(_)) | None => {}
    }

    Ok(harvested)
}

fn classify_order(order_id: &str, response: &QueryResponse) -> ResultDto {
    let header = &response.header;
    if header.success_code != 0 || header.return_count == 0 {
        if !header.errors.is_empty() {
            debug!(
                "[symantec-plugin] query for {order_id} returned errors: {}",
                render_errors(&header.errors)
            );
        }
        return ResultDto::with_sub_status(
            CertificateStatus::WaitingForCa,
            OrderSubStatus::InvalidOrder,
        );
    }
    let Some(detail) = &response.order_detail else {
        return unreadable(order_id, "OrderDetail");
    };

    let info = &detail.order_info;
    if let Some(echoed) = info
        .partner_order_id
        .as_deref()
        .filter(|echoed| *echoed != order_id)
    {
        warn!("[symantec-plugin] query for {order_id} answered for partner order {echoed}");
    }
    debug!(
        "[symantec-plugin] order {order_id} is GeoTrust order {} for {} as of {}",
        info.geotrust_order_id.as_deref().unwrap_or("?"),
        info.domain_name.as_deref().unwrap_or("?"),
        header.timestamp.as_deref().unwrap_or("?")
    );
    if info.order_state.as_deref() == Some("COMPLETED") {
        let Some(certificate_info) = &detail.certificate_info else {
            return unreadable(order_id, "CertificateInfo");
        };
        if certificate_info.certificate_status.as_deref() == Some("PENDING_REISSUE") {
            return ResultDto::with_sub_status(
                CertificateStatus::WaitingForCa,
                OrderSubStatus::PendingReissue,
            )
            .retryable(true);
        }
        let Some(fulfillment) = &detail.fulfillment else {
            return unreadable(order_id, "Fulfillment");
        };
        let Some(certificate) = fulfillment.server_certificate.clone() else {
            return unreadable(order_id, "ServerCertificate");
        };

        let first_of = |kind: ChainCertificateKind, label: &str| {
            fulfillment
                .ca_certificates
                .iter()
                .find(|entry| entry.kind == label)
                .map(|entry| ChainCertificate {
                    kind,
                    cert: entry.cert.clone(),
                })
        };
        let intermediates = [
            first_of(ChainCertificateKind::Intermediate, "INTERMEDIATE"),
            first_of(ChainCertificateKind::Root, "ROOT"),
        ]
        .into_iter()
        .flatten()
        .collect();

        info!(
            "[symantec-plugin] order {order_id} issued, valid {} to {}",
            certificate_info.start_date.as_deref().unwrap_or("?"),
            certificate_info.end_date.as_deref().unwrap_or("?")
        );
        return ResultDto::issued(certificate, intermediates);
    }

    if info.order_status_major.as_deref() == Some("CANCELLED") {
        return ResultDto::with_sub_status(
            CertificateStatus::RequestCanceled,
            OrderSubStatus::Cancelled,
        );
    }

    ResultDto::with_sub_status(CertificateStatus::WaitingForCa, OrderSubStatus::NotYetIssued)
        .retryable(true)
}

fn unreadable(order_id: &str, missing: &str) -> ResultDto {
    warn!("[symantec-plugin] status of {order_id} arrived without {missing}");
    ResultDto::with_sub_status(CertificateStatus::WaitingForCa, OrderSubStatus::Unreadable)
}
