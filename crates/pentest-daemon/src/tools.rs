//! Tool dispatch: validates each [`ToolCall`]'s arguments against its JSON
//! Schema, then routes it to Scope Guard, Browser Session Core, or Validator
//! Core and wraps the outcome as a [`ToolReply`].

use crate::identity::IdentityStore;
use browser_session::{BrowserDriver, BrowserSessionCore, Payload, PageOracle, SessionOptions};
use pentest_error::{ErrorCode, ErrorDetails};
use pentest_protocol::{tools as schemas, ArgumentSchema, ToolCall, ToolReply};
use scope_guard::ScopeGuard;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use validator_core::{Finding, IdentityProbe, NegativeControl, ValidatorCore};

fn arg_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ErrorDetails> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ErrorDetails { code: ErrorCode::Internal, message: format!("missing argument '{field}'"), details: BTreeMap::new() })
}

fn session_error_to_details(err: browser_session::SessionError) -> ErrorDetails {
    use browser_session::SessionError as E;
    let (code, message) = match &err {
        E::SessionLimit(_) => (ErrorCode::SessionLimitExceeded, err.to_string()),
        E::ProxyConnection(_) => (ErrorCode::ProxyConnectionFailed, err.to_string()),
        E::OutOfScope(_) | E::ScopeViolation { .. } => (ErrorCode::OutOfScope, err.to_string()),
        E::Budget(_) => (ErrorCode::BudgetExceeded, err.to_string()),
        E::Oracle(_) => (ErrorCode::ActionFailed, err.to_string()),
        E::UnknownSession(_) => (ErrorCode::SessionNotFound, err.to_string()),
        E::Driver(_) => (ErrorCode::Internal, err.to_string()),
        E::Timeout(_) => (ErrorCode::Timeout, err.to_string()),
        E::Cancelled(_) => (ErrorCode::Cancelled, err.to_string()),
    };
    ErrorDetails { code, message, details: BTreeMap::new() }
}

fn validator_error_to_details(err: validator_core::ValidatorError) -> ErrorDetails {
    use validator_core::ValidatorError as E;
    let (code, message) = match &err {
        E::OutOfScope(_) => (ErrorCode::OutOfScope, err.to_string()),
        E::Budget(_) => (ErrorCode::BudgetExceeded, err.to_string()),
        E::Timeout(_) => (ErrorCode::Timeout, err.to_string()),
        E::Cancelled(_) => (ErrorCode::Cancelled, err.to_string()),
    };
    ErrorDetails { code, message, details: BTreeMap::new() }
}

/// Ties every gated subsystem together behind one tool-call dispatch point.
pub struct ToolRouter<D: BrowserDriver + 'static> {
    scope_guard: Arc<ScopeGuard>,
    browser: Arc<BrowserSessionCore>,
    validator: Arc<ValidatorCore>,
    identities: Arc<IdentityStore>,
    oracle: Arc<dyn PageOracle>,
    proxy_url: String,
    headless: bool,
    _driver: std::marker::PhantomData<D>,
}

impl<D: BrowserDriver + 'static> ToolRouter<D> {
    /// Wire a router for one engagement's running subsystems.
    #[must_use]
    pub fn new(
        scope_guard: Arc<ScopeGuard>,
        browser: Arc<BrowserSessionCore>,
        validator: Arc<ValidatorCore>,
        identities: Arc<IdentityStore>,
        oracle: Arc<dyn PageOracle>,
        proxy_url: String,
        headless: bool,
    ) -> Self {
        Self { scope_guard, browser, validator, identities, oracle, proxy_url, headless, _driver: std::marker::PhantomData }
    }

    /// Validate and dispatch one tool call, returning its reply envelope.
    pub async fn dispatch(&self, call: ToolCall) -> ToolReply {
        match self.dispatch_inner(&call).await {
            Ok(result) => ToolReply::ok(result).unwrap_or_else(|e| {
                ToolReply::err(ErrorDetails { code: ErrorCode::Internal, message: e.to_string(), details: BTreeMap::new() })
            }),
            Err(details) => ToolReply::err(details),
        }
    }

    async fn dispatch_inner(&self, call: &ToolCall) -> Result<Value, ErrorDetails> {
        match call.name.as_str() {
            "scope.validate" => self.scope_validate(&call.arguments),
            "browser.create_session" => self.browser_create_session(&call.arguments).await,
            "browser.navigate" => self.browser_navigate(&call.arguments).await,
            "browser.act" => self.browser_act(&call.arguments).await,
            "browser.extract" => self.browser_extract(&call.arguments).await,
            "browser.xss_probe" => self.browser_xss_probe(&call.arguments).await,
            "validator.run_repro" => self.validator_run_repro(&call.arguments).await,
            "validator.run_cross_identity" => self.validator_run_cross_identity(&call.arguments).await,
            "validator.run_negative_control" => self.validator_run_negative_control(&call.arguments).await,
            other => Err(ErrorDetails { code: ErrorCode::Internal, message: format!("unknown tool '{other}'"), details: BTreeMap::new() }),
        }
    }

    fn validate_args(&self, schema: Value, args: &Value) -> Result<(), ErrorDetails> {
        let compiled = ArgumentSchema::compile(&schema)
            .map_err(|e| ErrorDetails { code: ErrorCode::Internal, message: e, details: BTreeMap::new() })?;
        compiled.validate(args).map_err(|e| ErrorDetails { code: ErrorCode::Internal, message: e.to_string(), details: BTreeMap::new() })
    }

    fn scope_validate(&self, args: &Value) -> Result<Value, ErrorDetails> {
        self.validate_args(schemas::scope_validate_schema(), args)?;
        let target = arg_str(args, "target")?;
        let result = self.scope_guard.validate(target);
        Ok(json!({"valid": result.valid, "reason": result.reason, "matchedRule": result.matched_rule}))
    }

    async fn browser_create_session(&self, args: &Value) -> Result<Value, ErrorDetails> {
        self.validate_args(schemas::browser_create_session_schema(), args)?;
        let headless = args.get("headless").and_then(Value::as_bool).unwrap_or(self.headless);
        let user_agent = args.get("userAgent").and_then(Value::as_str).map(str::to_string);
        let options = SessionOptions { proxy_url: self.proxy_url.clone(), headless, user_agent };
        let id = self.browser.create_session::<D>(options).await.map_err(session_error_to_details)?;
        Ok(json!({"sessionId": id}))
    }

    async fn browser_navigate(&self, args: &Value) -> Result<Value, ErrorDetails> {
        self.validate_args(schemas::browser_navigate_schema(), args)?;
        let session_id = arg_str(args, "sessionId")?;
        let url = arg_str(args, "url")?;
        let outcome = self.browser.navigate(session_id, url).await.map_err(session_error_to_details)?;
        Ok(serde_json::to_value(outcome).unwrap_or(Value::Null))
    }

    async fn browser_act(&self, args: &Value) -> Result<Value, ErrorDetails> {
        self.validate_args(schemas::browser_act_schema(), args)?;
        let session_id = arg_str(args, "sessionId")?;
        let instruction = arg_str(args, "instruction")?;
        let outcome = self.browser.act(session_id, instruction, self.oracle.as_ref()).await.map_err(session_error_to_details)?;
        Ok(serde_json::to_value(outcome).unwrap_or(Value::Null))
    }

    async fn browser_extract(&self, args: &Value) -> Result<Value, ErrorDetails> {
        self.validate_args(schemas::browser_extract_schema(), args)?;
        let session_id = arg_str(args, "sessionId")?;
        let instruction = arg_str(args, "instruction")?;
        self.browser.extract(session_id, instruction, self.oracle.as_ref()).await.map_err(session_error_to_details)
    }

    async fn browser_xss_probe(&self, args: &Value) -> Result<Value, ErrorDetails> {
        self.validate_args(schemas::browser_xss_probe_schema(), args)?;
        let session_id = arg_str(args, "sessionId")?;
        let form_selector = arg_str(args, "formSelector")?;
        let field_name = arg_str(args, "fieldName")?;
        let payloads = match args.get("payloads") {
            Some(value) => Some(
                serde_json::from_value::<Vec<Payload>>(value.clone())
                    .map_err(|e| ErrorDetails { code: ErrorCode::Internal, message: e.to_string(), details: BTreeMap::new() })?,
            ),
            None => None,
        };
        let report = self.browser.xss_probe(session_id, form_selector, field_name, payloads).await.map_err(session_error_to_details)?;
        Ok(serde_json::to_value(report).unwrap_or(Value::Null))
    }

    async fn validator_run_repro(&self, args: &Value) -> Result<Value, ErrorDetails> {
        self.validate_args(schemas::validator_run_repro_schema(), args)?;
        let finding: Finding = serde_json::from_value(args["finding"].clone())
            .map_err(|e| ErrorDetails { code: ErrorCode::Internal, message: e.to_string(), details: BTreeMap::new() })?;
        let count = args.get("count").and_then(Value::as_u64).unwrap_or(3) as usize;
        let result = self.validator.run_repro(&finding, count).await.map_err(validator_error_to_details)?;
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }

    async fn validator_run_cross_identity(&self, args: &Value) -> Result<Value, ErrorDetails> {
        self.validate_args(schemas::validator_run_cross_identity_schema(), args)?;
        let finding: Finding = serde_json::from_value(args["finding"].clone())
            .map_err(|e| ErrorDetails { code: ErrorCode::Internal, message: e.to_string(), details: BTreeMap::new() })?;
        let identities = args["identities"].as_array().cloned().unwrap_or_default();
        let mut probes: Vec<IdentityProbe> = Vec::with_capacity(identities.len());
        for entry in identities {
            let id = entry.get("identityId").and_then(Value::as_str).unwrap_or_default();
            let should_have_access = entry.get("shouldHaveAccess").and_then(Value::as_bool).unwrap_or(false);
            let probe = self
                .identities
                .probe_for(id, should_have_access)
                .map_err(|e| ErrorDetails { code: ErrorCode::Internal, message: e.to_string(), details: BTreeMap::new() })?;
            probes.push(probe);
        }
        let result = self.validator.run_cross_identity(&finding, &probes).await.map_err(validator_error_to_details)?;
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }

    async fn validator_run_negative_control(&self, args: &Value) -> Result<Value, ErrorDetails> {
        self.validate_args(schemas::validator_run_negative_control_schema(), args)?;
        let finding: Finding = serde_json::from_value(args["finding"].clone())
            .map_err(|e| ErrorDetails { code: ErrorCode::Internal, message: e.to_string(), details: BTreeMap::new() })?;
        let control: NegativeControl = serde_json::from_value(args["control"].clone())
            .map_err(|e| ErrorDetails { code: ErrorCode::Internal, message: e.to_string(), details: BTreeMap::new() })?;
        let result = self.validator.run_negative_control(&finding, &control).await.map_err(validator_error_to_details)?;
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }
}
