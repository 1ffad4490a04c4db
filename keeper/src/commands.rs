//! JSON-lines command surface
//!
//! One request per line, e.g.
//! `{"cmd":"buy","token":"0x..","account":"0x..","eth":"0.05"}`.
//! Amounts are decimal strings in whole units (18 decimals).

use alloy_primitives::utils::parse_ether;
use alloy_primitives::Address;
use curve_ledger::{Amount, Resolution, Role};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::KeeperError;
use crate::service::Keeper;
use crate::settlement::Settlement;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Deploy { caller: Address, name: String, symbol: String, admin: Address },
    Tokens,
    Buy { token: Address, account: Address, eth: String },
    Sell { token: Address, account: Address, tokens: String },
    QuoteBuy { token: Address, eth: String },
    QuoteSell { token: Address, tokens: String },
    Withdraw { token: Address, account: Address },
    Account { token: Address, account: Address },
    SetEmergency { token: Address, caller: Address, enabled: bool },
    EmergencyWithdraw { token: Address, caller: Address },
    WithdrawFees { token: Address, caller: Address },
    ReduceTradeFee { token: Address, caller: Address, bps: u64 },
    GrantRole { token: Address, caller: Address, role: Role, who: Address },
    RevokeRole { token: Address, caller: Address, role: Role, who: Address },
    PriceImpact { token: Address, amount: String, reserve: String },
    Snapshot { token: Address },
    Bars { token: Address, resolution: Resolution, from: u64, to: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn ok(result: Value) -> Self {
        Self { ok: true, result: Some(result), error: None }
    }

    fn err(message: impl ToString) -> Self {
        Self { ok: false, result: None, error: Some(message.to_string()) }
    }
}

/// Parse one input line; a malformed line becomes an error response
pub fn parse_line(line: &str) -> Result<Request, Response> {
    serde_json::from_str(line).map_err(|e| Response::err(format!("bad request: {}", e)))
}

fn amount(s: &str) -> Result<Amount, KeeperError> {
    parse_ether(s.trim()).map_err(|_| KeeperError::InvalidAmount(s.to_string()))
}

fn to_value<T: Serialize>(v: T) -> Result<Value, KeeperError> {
    serde_json::to_value(v).map_err(|e| KeeperError::Encode(e.to_string()))
}

pub async fn execute<S: Settlement>(keeper: &Keeper<S>, req: Request) -> Response {
    match dispatch(keeper, req).await {
        Ok(v) => Response::ok(v),
        Err(e) => Response::err(e),
    }
}

async fn dispatch<S: Settlement>(keeper: &Keeper<S>, req: Request) -> Result<Value, KeeperError> {
    match req {
        Request::Deploy { caller, name, symbol, admin } => to_value(keeper.deploy(caller, &name, &symbol, admin)?),
        Request::Tokens => to_value(keeper.tokens()),
        Request::Buy { token, account, eth } => {
            let eth_in = amount(&eth)?;
            to_value(keeper.ledger(&token)?.buy(account, eth_in).await?)
        }
        Request::Sell { token, account, tokens } => {
            let tokens_in = amount(&tokens)?;
            to_value(keeper.ledger(&token)?.sell(account, tokens_in).await?)
        }
        Request::QuoteBuy { token, eth } => {
            let eth_in = amount(&eth)?;
            to_value(keeper.ledger(&token)?.quote_purchase(eth_in).await?)
        }
        Request::QuoteSell { token, tokens } => {
            let tokens_in = amount(&tokens)?;
            to_value(keeper.ledger(&token)?.quote_sale(tokens_in).await?)
        }
        Request::Withdraw { token, account } => {
            let paid = keeper.ledger(&token)?.withdraw(account).await?;
            Ok(json!({ "paid": paid }))
        }
        Request::Account { token, account } => to_value(keeper.ledger(&token)?.account(account).await?),
        Request::SetEmergency { token, caller, enabled } => {
            keeper.ledger(&token)?.set_emergency_mode(caller, enabled).await?;
            Ok(json!({ "emergency_mode": enabled }))
        }
        Request::EmergencyWithdraw { token, caller } => {
            let swept = keeper.ledger(&token)?.emergency_withdraw(caller).await?;
            Ok(json!({ "swept": swept }))
        }
        Request::WithdrawFees { token, caller } => {
            let paid = keeper.ledger(&token)?.withdraw_fees(caller).await?;
            Ok(json!({ "paid": paid }))
        }
        Request::ReduceTradeFee { token, caller, bps } => {
            keeper.ledger(&token)?.reduce_trade_fee(caller, bps).await?;
            Ok(json!({ "trade_fee_bps": bps }))
        }
        Request::GrantRole { token, caller, role, who } => {
            keeper.ledger(&token)?.grant_role(caller, role, who).await?;
            Ok(json!({ "granted": role, "to": who }))
        }
        Request::RevokeRole { token, caller, role, who } => {
            keeper.ledger(&token)?.revoke_role(caller, role, who).await?;
            Ok(json!({ "revoked": role, "from": who }))
        }
        Request::PriceImpact { token, amount: a, reserve } => {
            let (a, reserve) = (amount(&a)?, amount(&reserve)?);
            let pct = keeper.ledger(&token)?.price_impact(a, reserve).await?;
            Ok(json!({ "impact_pct": pct }))
        }
        Request::Snapshot { token } => to_value(keeper.ledger(&token)?.snapshot().await?),
        Request::Bars { token, resolution, from, to } => {
            let bars = keeper.charts().bars(&token, resolution, from, to).ok_or(KeeperError::UnknownToken(token))?;
            to_value(bars)
        }
    }
}
