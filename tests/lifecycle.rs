use std::sync::Mutex;

use serde_json::{Value, json};
use symantec_ca_plugin::{
    ca::{
        CaCertificate, CaError, CertificateAuthority, CertificateInfo, DnsAuthDetails,
        FileAuthDetails, Fulfillment, ModifyOrderOperation, ModifyOrderRequest, OrderDetail,
        OrderInfo, OrderQuery, OrderResponse, OrderResponseHeader, QueryResponse,
        QueryResponseHeader, QuickOrderRequest, ReissueRequest, VendorError,
    },
    plugin::{
        CertificatePlugin, CertificateStatus, ChainCertificateKind, OrderMeta, OrderSubStatus,
        PluginMeta, SymantecPlugin, keys,
    },
};

/// Failure a [`FakeCa`] replays; `CaError` itself is not `Clone`.
#[derive(Clone)]
enum Failure {
    Transport(&'static str),
    Malformed(&'static str),
    Fault(&'static str),
}

impl Failure {
    fn to_error(&self) -> CaError {
        match self {
            Failure::Transport(message) => CaError::Transport((*message).into()),
            Failure::Malformed(message) => CaError::Malformed((*message).into()),
            Failure::Fault(message) => CaError::Fault((*message).into()),
        }
    }
}

/// In-memory CA: answers with whatever was queued and records every request.
#[derive(Default)]
struct FakeCa {
    order_response: Mutex<Option<Result<OrderResponse, Failure>>>,
    query_response: Mutex<Option<Result<QueryResponse, Failure>>>,
    quick_orders: Mutex<Vec<QuickOrderRequest>>,
    modifications: Mutex<Vec<ModifyOrderRequest>>,
    reissues: Mutex<Vec<ReissueRequest>>,
    queries: Mutex<Vec<OrderQuery>>,
}

impl FakeCa {
    fn answering(response: OrderResponse) -> Self {
        let ca = Self::default();
        *ca.order_response.lock().unwrap() = Some(Ok(response));
        ca
    }

    fn querying(response: QueryResponse) -> Self {
        let ca = Self::default();
        *ca.query_response.lock().unwrap() = Some(Ok(response));
        ca
    }

    fn unreachable() -> Self {
        Self::failing(Failure::Transport("connection reset"))
    }

    fn failing(failure: Failure) -> Self {
        let ca = Self::default();
        *ca.order_response.lock().unwrap() = Some(Err(failure.clone()));
        *ca.query_response.lock().unwrap() = Some(Err(failure));
        ca
    }

    fn next_order(&self) -> Result<OrderResponse, CaError> {
        match self.order_response.lock().unwrap().clone() {
            Some(Ok(response)) => Ok(response),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Err(CaError::Malformed("no canned order response".into())),
        }
    }
}

impl CertificateAuthority for FakeCa {
    fn quick_order(&self, request: &QuickOrderRequest) -> Result<OrderResponse, CaError> {
        self.quick_orders.lock().unwrap().push(request.clone());
        self.next_order()
    }

    fn get_order_by_partner_order_id(&self, query: &OrderQuery) -> Result<QueryResponse, CaError> {
        self.queries.lock().unwrap().push(query.clone());
        match self.query_response.lock().unwrap().clone() {
            Some(Ok(response)) => Ok(response),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Err(CaError::Malformed("no canned query response".into())),
        }
    }

    fn modify_order(&self, request: &ModifyOrderRequest) -> Result<OrderResponse, CaError> {
        self.modifications.lock().unwrap().push(request.clone());
        self.next_order()
    }

    fn reissue(&self, request: &ReissueRequest) -> Result<OrderResponse, CaError> {
        self.reissues.lock().unwrap().push(request.clone());
        self.next_order()
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn meta(value: Value) -> OrderMeta {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn order_meta(dv_method: Option<&str>) -> OrderMeta {
    let mut meta = meta(json!({
        "ProductCode": "SSL123",
        "ApproverEmail": "hostmaster@example.com",
        "CSR": "-----BEGIN CERTIFICATE REQUEST-----\nMIIB\n-----END CERTIFICATE REQUEST-----",
        "OrganizationName": "Example Ltd",
        "Country": "US",
        "AdminContactFirstName": "Ada",
        "AdminContactLastName": "Lovelace",
        "AdminContactEmail": "ada@example.com",
        "AdminContactPhone": "555-0100",
        "TechSameAsAdmin": true,
        "BillSameAsAdmin": true,
        "ValidityPeriod": 12
    }));
    if let Some(method) = dv_method {
        meta.insert("DVAuthMethod".into(), json!(method));
    }
    meta
}

fn accepted() -> OrderResponse {
    OrderResponse {
        header: OrderResponseHeader {
            partner_order_id: Some("order-1".into()),
            success_code: 0,
            errors: Vec::new(),
            timestamp: Some("2015-07-05T10:00:00Z".into()),
        },
        geotrust_order_id: Some("1234567".into()),
        dns_auth: None,
        file_auth: None,
    }
}

fn refused() -> OrderResponse {
    OrderResponse {
        header: OrderResponseHeader {
            success_code: -1,
            errors: vec![VendorError {
                code: Some("-2002".into()),
                field: Some("CSR".into()),
                message: Some("Invalid CSR".into()),
            }],
            ..Default::default()
        },
        ..Default::default()
    }
}

fn query(order_state: &str, status_major: &str, certificate_status: &str) -> QueryResponse {
    QueryResponse {
        header: QueryResponseHeader {
            success_code: 0,
            return_count: 1,
            ..Default::default()
        },
        order_detail: Some(OrderDetail {
            order_info: OrderInfo {
                partner_order_id: Some("order-1".into()),
                order_state: Some(order_state.into()),
                order_status_major: Some(status_major.into()),
                ..Default::default()
            },
            certificate_info: Some(CertificateInfo {
                certificate_status: Some(certificate_status.into()),
                ..Default::default()
            }),
            fulfillment: Some(Fulfillment {
                server_certificate: Some("LEAF".into()),
                ca_certificates: vec![
                    CaCertificate {
                        kind: "INTERMEDIATE".into(),
                        cert: "INTER".into(),
                    },
                    CaCertificate {
                        kind: "ROOT".into(),
                        cert: "ROOT".into(),
                    },
                ],
            }),
        }),
    }
}

#[test]
fn every_operation_yields_a_status_when_the_ca_is_down() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::unreachable());
    let mut plugin_meta = PluginMeta::new();

    let issue = plugin.issue_certificate_request("order-1", &order_meta(None), &mut plugin_meta);
    assert_eq!(issue.status, CertificateStatus::CaUnavailableForRequest);
    assert!(!issue.can_retry);
    assert!(plugin_meta.is_empty());

    let reissue_meta = meta(json!({"ReissueEmail": "a@example.com", "CSR": "NEW"}));
    let reissue = plugin.modify_certificate_request("order-1", &reissue_meta, &plugin_meta);
    assert_eq!(reissue.status, CertificateStatus::ClientDataIssueSeen);
    assert!(reissue.can_retry);

    let cancel = plugin.cancel_certificate_request("order-1");
    assert_eq!(cancel.status, CertificateStatus::CaUnavailableForRequest);
    assert!(!cancel.can_retry);

    let status = plugin.check_certificate_status("order-1");
    assert_eq!(status.status, CertificateStatus::WaitingForCa);
    assert_eq!(status.sub_status, Some(OrderSubStatus::Unreachable));
}

#[test]
fn unusable_ca_replies_are_final() {
    init_logging();
    for failure in [
        Failure::Malformed("missing SuccessCode"),
        Failure::Fault("Authentication failed"),
    ] {
        let plugin = SymantecPlugin::new(FakeCa::failing(failure));
        let mut plugin_meta = PluginMeta::new();

        let issue =
            plugin.issue_certificate_request("order-1", &order_meta(None), &mut plugin_meta);
        assert_eq!(issue.status, CertificateStatus::CaUnavailableForRequest);
        assert!(!issue.can_retry);
        assert!(plugin_meta.is_empty());

        let status = plugin.check_certificate_status("order-1");
        assert_eq!(status.status, CertificateStatus::WaitingForCa);
        assert_eq!(status.sub_status, Some(OrderSubStatus::Unreadable));
        assert_eq!(status.status_message.as_deref(), Some("Cannot fetch order Status"));
        assert!(!status.can_retry);
    }
}

#[test]
fn issue_refusal_reports_vendor_errors() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(refused()));
    let mut plugin_meta = PluginMeta::new();

    let result = plugin.issue_certificate_request("order-1", &order_meta(None), &mut plugin_meta);

    assert_eq!(result.status, CertificateStatus::CaUnavailableForRequest);
    assert_eq!(result.status_message.as_deref(), Some("-2002 CSR: Invalid CSR"));
    assert!(!result.can_retry);
    assert!(plugin_meta.is_empty());
}

#[test]
fn issue_with_missing_field_never_reaches_the_ca() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(accepted()));
    let mut order = order_meta(None);
    order.remove("CSR");

    let result = plugin.issue_certificate_request("order-1", &order, &mut PluginMeta::new());

    assert_eq!(result.status, CertificateStatus::CaUnavailableForRequest);
    assert_eq!(result.status_message.as_deref(), Some("CSR is required"));
    assert!(plugin.ca().quick_orders.lock().unwrap().is_empty());
}

#[test]
fn issue_persists_order_bookkeeping() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(accepted()));
    let mut plugin_meta = PluginMeta::new();

    let result = plugin.issue_certificate_request("order-1", &order_meta(None), &mut plugin_meta);

    assert_eq!(result.status, CertificateStatus::WaitingForCa);
    assert_eq!(plugin_meta[keys::GEOTRUST_ORDER_ID], "1234567");
    assert_eq!(plugin_meta[keys::PARTNER_ORDER_ID], "order-1");
    assert_eq!(plugin_meta[keys::PRODUCT_CODE], "SSL123");
    assert_eq!(plugin_meta[keys::TIMESTAMP], "2015-07-05T10:00:00Z");
    assert!(plugin_meta[keys::CSR].starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
    assert!(!plugin_meta.contains_key(keys::DNS_ENTRY));
    assert!(!plugin_meta.contains_key(keys::FILE_NAME));

    let sent = plugin.ca().quick_orders.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].partner_order_id, "order-1");
    assert_eq!(sent[0].tech_contact, sent[0].admin_contact);
    assert_eq!(sent[0].billing_contact, sent[0].admin_contact);
    assert_eq!(sent[0].parameters.get("ValidityPeriod").map(String::as_str), Some("12"));
}

#[test]
fn issue_with_dns_validation_stores_dns_entry() {
    init_logging();
    let response = OrderResponse {
        dns_auth: Some(DnsAuthDetails {
            dns_entry: Some("20150705abcdef".into()),
        }),
        ..accepted()
    };
    let plugin = SymantecPlugin::new(FakeCa::answering(response));
    let mut plugin_meta = PluginMeta::new();

    let result =
        plugin.issue_certificate_request("order-1", &order_meta(Some("dns")), &mut plugin_meta);

    assert_eq!(result.status, CertificateStatus::WaitingForCa);
    assert_eq!(plugin_meta[keys::DNS_ENTRY], "20150705abcdef");
    assert!(!plugin_meta.contains_key(keys::FILE_NAME));
}

#[test]
fn issue_with_file_validation_stores_file_details() {
    init_logging();
    let response = OrderResponse {
        file_auth: Some(FileAuthDetails {
            file_name: Some("fileauth.htm".into()),
            file_contents: Some("20150705xyz".into()),
        }),
        ..accepted()
    };
    let plugin = SymantecPlugin::new(FakeCa::answering(response));
    let mut plugin_meta = PluginMeta::new();

    let result =
        plugin.issue_certificate_request("order-1", &order_meta(Some("FILE")), &mut plugin_meta);

    assert_eq!(result.status, CertificateStatus::WaitingForCa);
    assert_eq!(plugin_meta[keys::FILE_NAME], "fileauth.htm");
    assert_eq!(plugin_meta[keys::FILE_CONTENTS], "20150705xyz");
    assert!(!plugin_meta.contains_key(keys::DNS_ENTRY));
}

#[test]
fn issue_with_email_validation_forwards_method_only() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(accepted()));
    let mut plugin_meta = PluginMeta::new();

    let result =
        plugin.issue_certificate_request("order-1", &order_meta(Some("EMAIL")), &mut plugin_meta);

    assert_eq!(result.status, CertificateStatus::WaitingForCa);
    assert_eq!(plugin_meta[keys::GEOTRUST_ORDER_ID], "1234567");
    assert!(!plugin_meta.contains_key(keys::DNS_ENTRY));
    assert!(!plugin_meta.contains_key(keys::FILE_NAME));
    assert!(!plugin_meta.contains_key(keys::FILE_CONTENTS));

    let sent = plugin.ca().quick_orders.lock().unwrap();
    assert_eq!(sent[0].parameters.get("DVAuthMethod").map(String::as_str), Some("EMAIL"));
}

#[test]
fn issue_with_incomplete_dv_details_leaves_metadata_untouched() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(accepted()));
    let mut plugin_meta = PluginMeta::new();
    plugin_meta.insert("Existing".into(), "kept".into());

    let result =
        plugin.issue_certificate_request("order-1", &order_meta(Some("DNS")), &mut plugin_meta);

    assert_eq!(result.status, CertificateStatus::CaUnavailableForRequest);
    assert!(!result.can_retry);
    assert_eq!(plugin_meta.len(), 1);
    assert_eq!(plugin_meta["Existing"], "kept");
}

#[test]
fn status_returns_leaf_and_chain_when_completed() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::querying(query("COMPLETED", "COMPLETE", "ACTIVE")));

    let result = plugin.check_certificate_status("order-1");

    assert_eq!(result.status, CertificateStatus::CertificateGenerated);
    assert_eq!(result.sub_status, Some(OrderSubStatus::Issued));
    assert_eq!(result.certificate.as_deref(), Some("LEAF"));
    assert_eq!(result.intermediates.len(), 2);
    assert_eq!(result.intermediates[0].kind, ChainCertificateKind::Intermediate);
    assert_eq!(result.intermediates[0].cert, "INTER");
    assert_eq!(result.intermediates[1].kind, ChainCertificateKind::Root);
    assert_eq!(result.intermediates[1].cert, "ROOT");

    let queries = plugin.ca().queries.lock().unwrap();
    assert_eq!(queries[0].partner_order_id, "order-1");
    assert!(queries[0].return_certificate_info);
    assert!(queries[0].return_fulfillment);
    assert!(queries[0].return_ca_certs);
}

#[test]
fn status_pending_reissue_carries_no_material() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::querying(query(
        "COMPLETED",
        "COMPLETE",
        "PENDING_REISSUE",
    )));

    let result = plugin.check_certificate_status("order-1");

    assert_eq!(result.status, CertificateStatus::WaitingForCa);
    assert_eq!(result.status_message.as_deref(), Some("PENDING_REISSUE"));
    assert_eq!(result.sub_status, Some(OrderSubStatus::PendingReissue));
    assert!(result.can_retry);
    assert!(result.certificate.is_none());
    assert!(result.intermediates.is_empty());
}

#[test]
fn status_cancelled_order_is_request_canceled() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::querying(query("CANCELLED", "CANCELLED", "REVOKED")));

    let result = plugin.check_certificate_status("order-1");

    assert_eq!(result.status, CertificateStatus::RequestCanceled);
    assert_eq!(result.status_message.as_deref(), Some("CANCELLED"));
}

#[test]
fn status_in_progress_is_retryable() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::querying(query(
        "WF_DOMAIN_APPROVAL",
        "PENDING",
        "PENDING",
    )));

    let result = plugin.check_certificate_status("order-1");

    assert_eq!(result.status, CertificateStatus::WaitingForCa);
    assert_eq!(result.status_message.as_deref(), Some("Certificate not yet issued"));
    assert!(result.can_retry);
}

#[test]
fn status_with_zero_results_is_invalid_order() {
    init_logging();
    let response = QueryResponse {
        header: QueryResponseHeader {
            success_code: 0,
            return_count: 0,
            ..Default::default()
        },
        order_detail: None,
    };
    let plugin = SymantecPlugin::new(FakeCa::querying(response));

    let result = plugin.check_certificate_status("unknown");

    assert_eq!(result.status, CertificateStatus::WaitingForCa);
    assert_eq!(result.status_message.as_deref(), Some("Invalid order ID"));
    assert_eq!(result.sub_status, Some(OrderSubStatus::InvalidOrder));
}

#[test]
fn status_success_without_order_detail_is_unreadable() {
    init_logging();
    let response = QueryResponse {
        header: QueryResponseHeader {
            success_code: 0,
            return_count: 1,
            ..Default::default()
        },
        order_detail: None,
    };
    let plugin = SymantecPlugin::new(FakeCa::querying(response));

    let result = plugin.check_certificate_status("order-1");

    assert_eq!(result.status, CertificateStatus::WaitingForCa);
    assert_eq!(result.sub_status, Some(OrderSubStatus::Unreadable));
    assert_eq!(result.status_message.as_deref(), Some("Cannot fetch order Status"));
    assert!(!result.can_retry);
}

#[test]
fn reissue_refusal_is_client_data_issue() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(refused()));
    let reissue_meta = meta(json!({"ReissueEmail": "a@example.com", "CSR": "NEW"}));

    let result = plugin.modify_certificate_request("order-1", &reissue_meta, &PluginMeta::new());

    assert_eq!(result.status, CertificateStatus::ClientDataIssueSeen);
    assert_eq!(result.status_message.as_deref(), Some("-2002 CSR: Invalid CSR"));
    assert!(result.can_retry);
}

#[test]
fn reissue_uses_persisted_csr_and_new_partner_order_id() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(accepted()));
    let mut plugin_meta = PluginMeta::new();
    plugin_meta.insert(keys::CSR.into(), "STORED-CSR".into());
    let reissue_meta = meta(json!({
        "ReissueEmail": "a@example.com",
        "PartnerOrderID": "order-1-r1",
        "SignatureHashAlgorithm": "SHA2-256",
        "OrderChanges": [{"ChangeType": "Add_SAN", "NewValue": "www.example.com"}]
    }));

    let result = plugin.modify_certificate_request("order-1", &reissue_meta, &plugin_meta);

    assert_eq!(result.status, CertificateStatus::WaitingForCa);
    let reissues = plugin.ca().reissues.lock().unwrap();
    assert_eq!(reissues[0].original_partner_order_id, "order-1");
    assert_eq!(reissues[0].partner_order_id.as_deref(), Some("order-1-r1"));
    assert_eq!(reissues[0].csr, "STORED-CSR");
    assert_eq!(reissues[0].signature_hash_algorithm.as_deref(), Some("SHA2-256"));
    assert_eq!(reissues[0].order_changes.len(), 1);
    assert!(reissues[0].replay_token.is_none());
}

#[test]
fn issue_forwards_replay_token() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(accepted()));
    let mut order = order_meta(None);
    order.insert("ReplayToken".into(), json!("issue-order-1"));

    plugin.issue_certificate_request("order-1", &order, &mut PluginMeta::new());

    let sent = plugin.ca().quick_orders.lock().unwrap();
    assert_eq!(sent[0].replay_token.as_deref(), Some("issue-order-1"));
    assert!(!sent[0].parameters.contains_key("ReplayToken"));
}

#[test]
fn cancel_success_is_request_canceled() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(accepted()));

    let result = plugin.cancel_certificate_request("order-1");

    assert_eq!(result.status, CertificateStatus::RequestCanceled);
    let modifications = plugin.ca().modifications.lock().unwrap();
    assert_eq!(modifications[0].partner_order_id, "order-1");
    assert_eq!(modifications[0].operation, ModifyOrderOperation::Cancel);
}

#[test]
fn cancel_refusal_is_not_retryable() {
    init_logging();
    let plugin = SymantecPlugin::new(FakeCa::answering(refused()));

    let result = plugin.cancel_certificate_request("order-1");

    assert_eq!(result.status, CertificateStatus::CaUnavailableForRequest);
    assert!(!result.can_retry);
}
