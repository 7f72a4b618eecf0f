//! Transaction runner - login then place an order for one account

use std::fmt;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::debug;

use crate::actors::Actor;
use crate::outcome::{mask_secret, Failure, FailureKind, Outcome};
use crate::payload::OrderPayload;
use crate::transport::{Transport, TransportResponse};

pub const LOGIN_PATH: &str = "/api/admin/admin-user/login";
pub const CREATE_ORDER_PATH: &str = "/api/admin/reserveOrder/create";

/// Header carrying the session token on authenticated calls
pub const LOGIN_KEY_HEADER: &str = "loginKey";

/// Top-level `message` the admin API sends on every successful call.
///
/// Replies carrying any other text (`"ok"`, for instance) are a
/// `ProtocolMismatch` unless `success_message` overrides this.
const DEFAULT_SUCCESS_MESSAGE: &str = "请求成功";

/// What a well-formed response looks like
#[derive(Debug, Clone)]
pub struct Expectations {
    pub http_status: u16,

    /// Top-level `message` of a login response
    pub success_message: String,
}

impl Default for Expectations {
    fn default() -> Self {
        Self {
            http_status: 200,
            success_message: DEFAULT_SUCCESS_MESSAGE.to_string(),
        }
    }
}

/// Session token obtained by one login. Owned by a single transaction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    login_key: String,
}

impl Credential {
    pub fn login_key(&self) -> &str {
        &self.login_key
    }

    fn header(&self) -> [(&str, &str); 1] {
        [(LOGIN_KEY_HEADER, self.login_key.as_str())]
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("login_key", &mask_secret(&self.login_key))
            .finish()
    }
}

struct LoginReply {
    credential: Option<Credential>,
    data_message: Option<String>,
}

/// Log in as `actor` and create the order derived from `actor.order_index`
/// with the obtained `loginKey`.
///
/// Every order needs a `loginKey`. An actor configured with a failing login
/// code therefore fails with `ProtocolMismatch` here; use [`check_login`] for
/// negative login checks.
pub async fn run_transaction(
    transport: &dyn Transport,
    actor: &Actor,
    expect: &Expectations,
) -> Outcome {
    let start = Instant::now();

    let reply = match login(transport, actor, expect).await {
        Ok(reply) => reply,
        Err(failure) => return Outcome::failed(actor.clone(), failure, None, elapsed_ms(start)),
    };

    let credential = match reply.credential {
        Some(credential) => credential,
        None => {
            let failure = Failure::new(
                FailureKind::ProtocolMismatch,
                "login succeeded without a loginKey",
            )
            .at("login");
            return Outcome::failed(actor.clone(), failure, None, elapsed_ms(start));
        }
    };

    let login_key = Some(credential.login_key().to_string());
    match create_order(transport, actor, &credential, expect).await {
        Ok(order_id) => {
            Outcome::success(actor.clone(), login_key, Some(order_id), elapsed_ms(start))
        }
        Err(failure) => Outcome::failed(actor.clone(), failure, login_key, elapsed_ms(start)),
    }
}

/// Log in as `actor` and verify the reply, including `data.message` when the
/// actor names one. Never places an order.
pub async fn check_login(
    transport: &dyn Transport,
    actor: &Actor,
    expect: &Expectations,
) -> Outcome {
    let start = Instant::now();

    let reply = match login(transport, actor, expect).await {
        Ok(reply) => reply,
        Err(failure) => return Outcome::failed(actor.clone(), failure, None, elapsed_ms(start)),
    };
    let login_key = reply.credential.map(|c| c.login_key);

    if let Some(expected) = &actor.expected_data_message {
        let actual = reply.data_message.as_deref().unwrap_or("<missing>");
        if actual != expected {
            let failure =
                Failure::new(FailureKind::ProtocolMismatch, "login data.message mismatch")
                    .at("login")
                    .with_status(expect.http_status)
                    .expected(expected, actual);
            return Outcome::failed(actor.clone(), failure, login_key, elapsed_ms(start));
        }
    }

    Outcome::success(actor.clone(), login_key, None, elapsed_ms(start))
}

async fn login(
    transport: &dyn Transport,
    actor: &Actor,
    expect: &Expectations,
) -> Result<LoginReply, Failure> {
    let body = json!({
        "userName": actor.user_name,
        "password": actor.password,
    });

    let response = transport
        .post(LOGIN_PATH, &body, &[])
        .await
        .map_err(|e| Failure::new(FailureKind::TransportError, e.to_string()).at("login"))?;

    let reply = verify_login(&response, actor, expect)?;
    if let Some(credential) = &reply.credential {
        debug!(
            "{} logged in, loginKey: {}",
            actor.user_name,
            mask_secret(credential.login_key())
        );
    }
    Ok(reply)
}

fn verify_login(
    response: &TransportResponse,
    actor: &Actor,
    expect: &Expectations,
) -> Result<LoginReply, Failure> {
    let body = expect_json(response, expect, "login")?;

    let code = body.get("code").and_then(Value::as_i64).ok_or_else(|| {
        Failure::new(
            FailureKind::ProtocolMismatch,
            format!("login response has no numeric code: {}", response.raw),
        )
        .at("login")
        .with_status(response.status)
    })?;

    let message = body.get("message").and_then(Value::as_str).unwrap_or("<missing>");

    if code != actor.expected_login_code {
        return Err(Failure::new(
            FailureKind::UnexpectedStatus,
            format!("login returned code {}: {}", code, message),
        )
        .at("login")
        .with_status(response.status)
        .expected(actor.expected_login_code, code));
    }

    if message != expect.success_message {
        return Err(Failure::new(FailureKind::ProtocolMismatch, "login message mismatch")
            .at("login")
            .with_status(response.status)
            .expected(&expect.success_message, message));
    }

    let data = body.get("data");
    let data_message = data
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if !actor.expects_login_success() {
        return Ok(LoginReply {
            credential: None,
            data_message,
        });
    }

    let login_key = data
        .and_then(|d| d.get("loginKey"))
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            Failure::new(
                FailureKind::ProtocolMismatch,
                format!("login succeeded without a loginKey: {}", response.raw),
            )
            .at("login")
            .with_status(response.status)
        })?;

    Ok(LoginReply {
        credential: Some(Credential {
            login_key: login_key.to_string(),
        }),
        data_message,
    })
}

async fn create_order(
    transport: &dyn Transport,
    actor: &Actor,
    credential: &Credential,
    expect: &Expectations,
) -> Result<String, Failure> {
    let payload = OrderPayload::for_index(actor.order_index);

    let response = transport
        .post(CREATE_ORDER_PATH, &payload.to_json(), &credential.header())
        .await
        .map_err(|e| Failure::new(FailureKind::TransportError, e.to_string()).at("order"))?;

    let body = expect_json(&response, expect, "order")?;

    let data = body.get("data").filter(|d| !d.is_null()).ok_or_else(|| {
        Failure::new(
            FailureKind::ProtocolMismatch,
            format!("order response has no data: {}", response.raw),
        )
        .at("order")
        .with_status(response.status)
    })?;

    let order_id = data
        .get("reserveOrder")
        .and_then(|order| order.get("innerOrderNo"))
        .and_then(order_id_text)
        .ok_or_else(|| {
            Failure::new(
                FailureKind::MissingOrderId,
                format!("order response has no innerOrderNo: {}", response.raw),
            )
            .at("order")
            .with_status(response.status)
        })?;

    debug!("{} placed order {}", actor.user_name, order_id);
    Ok(order_id)
}

fn expect_json<'a>(
    response: &'a TransportResponse,
    expect: &Expectations,
    step: &str,
) -> Result<&'a Value, Failure> {
    if response.status != expect.http_status {
        return Err(Failure::new(
            FailureKind::UnexpectedStatus,
            format!("{} returned HTTP {}: {}", step, response.status, response.raw),
        )
        .at(step)
        .with_status(response.status)
        .expected(expect.http_status, response.status));
    }

    response.body.as_ref().ok_or_else(|| {
        Failure::new(
            FailureKind::ProtocolMismatch,
            format!("{} response is not JSON: {}", step, response.raw),
        )
        .at(step)
        .with_status(response.status)
    })
}

fn order_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
