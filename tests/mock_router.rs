//! Handler tests through the mock harness.

use axum::http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use switchyard::context::{Context, Formdata, Output};
use switchyard::testing::{MockContext, MockRouter};
use switchyard::{Error, Router};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Pet {
    name: String,
    age: u8,
}

fn pets() -> Router {
    let mut routes = Router::builder();
    routes.before(|ctx| {
        if ctx.header("x-api-key") == Some("letmein") {
            Ok(())
        } else {
            ctx.send_status(StatusCode::UNAUTHORIZED)
        }
    });
    routes.path("/pets", |pets| {
        pets.get("/{id:[0-9]+}", |ctx| {
            let id: u32 = ctx.path_map().value("id")?;
            Output::json(&Pet {
                name: format!("pet-{}", id),
                age: 3,
            })
        });
        pets.post("", |ctx| {
            let pet: Pet = ctx.body().json()?;
            ctx.set_response_code(StatusCode::CREATED);
            Ok(pet.name)
        });
        pets.put("/{id}", |ctx| {
            let form = ctx.form()?;
            Ok(form.get("name").unwrap_or("").to_string())
        });
        pets.delete("/{id}", |_| Ok(StatusCode::NO_CONTENT));
    });
    routes.build().unwrap()
}

fn authorized(ctx: &mut MockContext) {
    ctx.set_request_header("x-api-key", "letmein");
}

#[test]
fn guard_short_circuits_unauthorized() {
    let response = MockRouter::new(pets()).get("/pets/1");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.value().is_none());
}

#[test]
fn records_json_output() {
    let mock = MockRouter::new(pets());
    let response = mock.call(Method::GET, "/pets/7", authorized);
    let Some(Output::Json(value)) = response.value() else {
        panic!("expected json output, got {:?}", response.value());
    };
    assert_eq!(value["name"], "pet-7");
}

#[test]
fn body_and_form_inputs() {
    let mock = MockRouter::new(pets());

    let created = mock.call(Method::POST, "/pets", |ctx| {
        authorized(ctx);
        ctx.set_body(r#"{"name":"rex","age":2}"#);
    });
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(created.value(), Some(&Output::Text("rex".into())));

    let updated = mock.call(Method::PUT, "/pets/7", |ctx| {
        authorized(ctx);
        ctx.set_form(Formdata::new().field("name", "fido"));
    });
    assert_eq!(updated.value(), Some(&Output::Text("fido".into())));

    let deleted = mock.call(Method::DELETE, "/pets/7", authorized);
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[test]
fn errors_are_recorded() {
    let mock = MockRouter::new(pets());

    let bad = mock.call(Method::POST, "/pets", |ctx| {
        authorized(ctx);
        ctx.set_body("not json");
    });
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    assert!(bad.error().is_some());

    let missing = mock.call(Method::GET, "/pets/abc", authorized);
    assert!(matches!(missing.error(), Some(Error::NotFound(_))));

    let wrong = mock.call(Method::PATCH, "/pets/1", authorized);
    assert_eq!(wrong.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn full_execution_writes_bytes() {
    let mock = MockRouter::new(pets()).full_execution(true);
    let response = mock.call(Method::GET, "/pets/2", authorized);
    let pet: Pet = serde_json::from_slice(&response.body()).unwrap();
    assert_eq!(
        pet,
        Pet {
            name: "pet-2".into(),
            age: 3
        }
    );
    assert_eq!(response.content_type(), Some("application/json"));
}

#[test]
fn handler_runs_directly_on_a_mock_context() {
    let handler = |ctx: &mut dyn Context| -> switchyard::Result<String> {
        Ok(format!(
            "{} {} {}",
            ctx.query().get("q").unwrap_or(""),
            ctx.cookie("sid").unwrap_or(""),
            ctx.remote_address()
        ))
    };

    let mut ctx = MockContext::new();
    ctx.set_path_string("/search?q=rust")
        .set_cookie("sid", "abc")
        .set_remote_address("10.0.0.9");
    assert_eq!(handler(&mut ctx).unwrap(), "rust abc 10.0.0.9");
}
