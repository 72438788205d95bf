use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tenantry_auth::BearerResolver;
use tenantry_core::{ErrorKind, Principal, ScopeError, ScopedApp, TenantContext};
use tenantry_crm::{build_with, CrmParams};
use uuid::Uuid;

const SECRET: &str = "crm-relations-secret";

fn app() -> ScopedApp<Value, CrmParams> {
    let vars = vec![("TENANTRY__AUTH__SECRET".to_string(), SECRET.to_string())];
    build_with(vars, None).unwrap().app
}

/// Authenticates a fresh caller of a fresh tenant the way the REST layer does.
async fn caller(app: &ScopedApp<Value, CrmParams>) -> TenantContext {
    let token = encode(
        &Header::default(),
        &json!({
            "sub": Uuid::new_v4().to_string(),
            "tenant_id": Uuid::new_v4().to_string(),
            "exp": (Utc::now() + chrono::Duration::minutes(10)).timestamp(),
            "type": "access",
        }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let resolver = BearerResolver::from_config(&app.config_snapshot()).unwrap();
    let headers = HashMap::from([("authorization".to_string(), format!("Bearer {token}"))]);
    let principal = Principal::authenticate(&resolver, &headers).await.unwrap();
    TenantContext::resolve(&principal)
}

fn params() -> CrmParams {
    CrmParams::default()
}

fn id_of(v: &Value) -> String {
    v["id"].as_str().unwrap().to_string()
}

async fn new_contact(app: &ScopedApp<Value, CrmParams>, ctx: &TenantContext) -> String {
    let contact = app
        .service("contacts")
        .unwrap()
        .create(ctx, json!({"first_name": "Ada", "last_name": "Lovelace"}), params())
        .await
        .unwrap();
    id_of(&contact)
}

async fn deals_of(app: &ScopedApp<Value, CrmParams>, ctx: &TenantContext, contact: &str) -> usize {
    let mut p = params();
    p.query = HashMap::from([("contact_id".to_string(), contact.to_string()), ("limit".to_string(), "100".to_string())]);
    let deals = app.service("deals").unwrap();

    let mut count = 0;
    loop {
        let page = deals.find(ctx, p.clone()).await.unwrap();
        count += page.data.len();
        match page.next_page_token {
            Some(token) => {
                p.query.insert("pageToken".to_string(), token);
            }
            None => return count,
        }
    }
}

async fn contact_exists(app: &ScopedApp<Value, CrmParams>, ctx: &TenantContext, id: &str) -> bool {
    match app.service("contacts").unwrap().get(ctx, id, params()).await {
        Ok(_) => true,
        Err(e) => {
            assert_eq!(ScopeError::kind_of(&e), ErrorKind::NotFound, "{e}");
            false
        }
    }
}

#[tokio::test]
async fn interrupted_remove_never_orphans_children() {
    let app = app();
    let ctx = caller(&app).await;
    let contact = new_contact(&app, &ctx).await;

    let deals = app.service("deals").unwrap();
    for i in 0..300 {
        deals
            .create(&ctx, json!({"title": format!("Deal {i}"), "contact_id": contact}), params())
            .await
            .unwrap();
    }

    for budget in [0u64, 1, 5, 50] {
        let task = {
            let app = app.clone();
            let ctx = ctx.clone();
            let contact = contact.clone();
            tokio::spawn(async move {
                app.service("contacts")
                    .unwrap()
                    .remove(&ctx, &contact, params())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_micros(budget)).await;
        task.abort();
        let _ = task.await;

        let remaining = deals_of(&app, &ctx, &contact).await;
        if !contact_exists(&app, &ctx, &contact).await {
            assert_eq!(remaining, 0, "contact removed with {remaining} deals left behind");
            return;
        }
    }

    app.service("contacts")
        .unwrap()
        .remove(&ctx, &contact, params())
        .await
        .unwrap();
    assert!(!contact_exists(&app, &ctx, &contact).await);
    assert_eq!(deals_of(&app, &ctx, &contact).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn creates_racing_a_remove_leave_no_orphans() {
    let app = app();
    let ctx = caller(&app).await;

    for _ in 0..10 {
        let contact = new_contact(&app, &ctx).await;

        let mut writers = Vec::new();
        for i in 0..20 {
            let app = app.clone();
            let ctx = ctx.clone();
            let contact = contact.clone();
            writers.push(tokio::spawn(async move {
                app.service("deals")
                    .unwrap()
                    .create(&ctx, json!({"title": format!("Deal {i}"), "contact_id": contact}), params())
                    .await
            }));
        }

        app.service("contacts")
            .unwrap()
            .remove(&ctx, &contact, params())
            .await
            .unwrap();

        for writer in writers {
            if let Err(e) = writer.await.unwrap() {
                assert_eq!(ScopeError::kind_of(&e), ErrorKind::NotFound, "{e}");
            }
        }
        assert_eq!(deals_of(&app, &ctx, &contact).await, 0);
    }
}

#[tokio::test]
async fn foreign_remove_touches_nothing() {
    let app = app();
    let owner = caller(&app).await;
    let intruder = caller(&app).await;
    let contact = new_contact(&app, &owner).await;
    app.service("deals")
        .unwrap()
        .create(&owner, json!({"title": "Sale", "contact_id": contact}), params())
        .await
        .unwrap();

    let err = app
        .service("contacts")
        .unwrap()
        .remove(&intruder, &contact, params())
        .await
        .unwrap_err();
    assert_eq!(ScopeError::kind_of(&err), ErrorKind::NotFound);

    assert!(contact_exists(&app, &owner, &contact).await);
    assert_eq!(deals_of(&app, &owner, &contact).await, 1);
}
