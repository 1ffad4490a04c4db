//! JSON-lines command surface against a live keeper

use curve_integration_tests::*;
use curve_keeper::commands::{execute, parse_line, Response};
use serde_json::Value;

async fn run(env: &TestEnv, line: &str) -> Response {
    match parse_line(line) {
        Ok(req) => execute(&env.keeper, req).await,
        Err(resp) => resp,
    }
}

fn result(resp: Response) -> Value {
    assert!(resp.ok, "command failed: {:?}", resp.error);
    resp.result.unwrap_or(Value::Null)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deploy_trade_and_chart_over_commands() {
    let env = TestEnv::local();
    let admin = format!("{}", admin());
    let alice = format!("{}", user(0xa1));

    let deployed = result(
        run(&env, &format!(r#"{{"cmd":"deploy","caller":"{admin}","name":"Frog","symbol":"FROG","admin":"{admin}"}}"#))
            .await,
    );
    let token = deployed["token"].as_str().unwrap().to_string();
    assert_eq!(deployed["symbol"], "FROG");

    let tokens = result(run(&env, r#"{"cmd":"tokens"}"#).await);
    assert_eq!(tokens.as_array().unwrap().len(), 1);

    let quote = result(run(&env, &format!(r#"{{"cmd":"quote_buy","token":"{token}","eth":"0.01"}}"#)).await);
    let bought = result(
        run(&env, &format!(r#"{{"cmd":"buy","token":"{token}","account":"{alice}","eth":"0.01"}}"#)).await,
    );
    assert_eq!(quote["amount_out"], bought["amount_out"]);

    let account = result(run(&env, &format!(r#"{{"cmd":"account","token":"{token}","account":"{alice}"}}"#)).await);
    assert_eq!(account["balance"], bought["amount_out"]);
    assert_eq!(account["action_count"], 1);

    env.settle_events().await;
    let bars = result(
        run(&env, &format!(r#"{{"cmd":"bars","token":"{token}","resolution":"1","from":0,"to":{}}}"#, u64::MAX))
            .await,
    );
    let bars = bars.as_array().unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0]["volume"], 0.01);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_errors_come_back_as_responses() {
    let env = TestEnv::local();
    let alice = format!("{}", user(0xa1));
    let unknown = format!("{}", user(0x55));

    let resp = run(&env, "not json").await;
    assert!(!resp.ok);

    let resp = run(&env, &format!(r#"{{"cmd":"buy","token":"{unknown}","account":"{alice}","eth":"0.01"}}"#)).await;
    assert!(resp.error.unwrap().contains("unknown token"));

    let token = format!("{}", env.deploy("FROG").token());
    let resp = run(&env, &format!(r#"{{"cmd":"buy","token":"{token}","account":"{alice}","eth":"lots"}}"#)).await;
    assert!(resp.error.unwrap().contains("invalid amount"));

    let resp = run(&env, &format!(r#"{{"cmd":"buy","token":"{token}","account":"{alice}","eth":"40"}}"#)).await;
    assert!(resp.error.unwrap().contains("price impact"));

    let resp = run(&env, &format!(r#"{{"cmd":"withdraw_fees","token":"{token}","caller":"{alice}"}}"#)).await;
    assert_eq!(resp.error.as_deref(), Some("caller is not authorized"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_admin_commands() {
    let env = TestEnv::local();
    let admin = format!("{}", admin());
    let token = format!("{}", env.deploy("FROG").token());

    result(run(&env, &format!(r#"{{"cmd":"reduce_trade_fee","token":"{token}","caller":"{admin}","bps":50}}"#)).await);
    let snapshot = result(run(&env, &format!(r#"{{"cmd":"snapshot","token":"{token}"}}"#)).await);
    assert_eq!(snapshot["trade_fee_bps"], 50);

    let line = format!(r#"{{"cmd":"set_emergency","token":"{token}","caller":"{admin}","enabled":true}}"#);
    result(run(&env, &line).await);
    let snapshot = result(run(&env, &format!(r#"{{"cmd":"snapshot","token":"{token}"}}"#)).await);
    assert_eq!(snapshot["state"], "emergency_paused");

    // Nothing held yet
    let resp = run(&env, &format!(r#"{{"cmd":"emergency_withdraw","token":"{token}","caller":"{admin}"}}"#)).await;
    assert_eq!(resp.error.as_deref(), Some("nothing to withdraw"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_role_commands() {
    let env = TestEnv::local();
    let admin = format!("{}", admin());
    let bob = format!("{}", user(0xb0));
    let token = format!("{}", env.deploy("FROG").token());
    let set_emergency = |caller: &str, enabled: bool| {
        format!(r#"{{"cmd":"set_emergency","token":"{token}","caller":"{caller}","enabled":{enabled}}}"#)
    };

    let resp = run(&env, &set_emergency(&bob, true)).await;
    assert_eq!(resp.error.as_deref(), Some("caller is not authorized"));

    let grant = format!(r#"{{"cmd":"grant_role","token":"{token}","caller":"{admin}","role":"admin","who":"{bob}"}}"#);
    let granted = result(run(&env, &grant).await);
    assert_eq!(granted["granted"], "admin");
    result(run(&env, &set_emergency(&bob, true)).await);

    let revoke =
        format!(r#"{{"cmd":"revoke_role","token":"{token}","caller":"{admin}","role":"admin","who":"{bob}"}}"#);
    assert_eq!(result(run(&env, &revoke).await)["revoked"], "admin");
    let resp = run(&env, &set_emergency(&bob, false)).await;
    assert_eq!(resp.error.as_deref(), Some("caller is not authorized"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_price_impact_command() {
    let env = TestEnv::local();
    let token = format!("{}", env.deploy("FROG").token());
    let impact = |amount: &str| {
        format!(r#"{{"cmd":"price_impact","token":"{token}","amount":"{amount}","reserve":"1.6"}}"#)
    };

    let at_limit = result(run(&env, &impact("0.16")).await);
    assert_eq!(at_limit["impact_pct"], serde_json::to_value(alloy_primitives::U256::from(10u8)).unwrap());
    let small = result(run(&env, &impact("0.01")).await);
    assert_eq!(small["impact_pct"], serde_json::to_value(alloy_primitives::U256::ZERO).unwrap());

    let line = format!(r#"{{"cmd":"price_impact","token":"{token}","amount":"1","reserve":"0"}}"#);
    assert!(!run(&env, &line).await.ok);
}
