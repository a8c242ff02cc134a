use super::*;
use serde_json::json;

fn page_context(title: &str) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("page_title", title);
    context.insert("path", "/");
    context.insert("is_authenticated", &false);
    context.insert("csrf_token", "token123");
    context.insert("error_message", &Option::<String>::None);
    context.insert("validation_fields", &Vec::<String>::new());
    context.insert("old_input", &json!({}));
    context
}

#[test]
fn test_embedded_templates_load() {
    let views = ViewEngine::embedded().unwrap();
    for name in [
        "base.html",
        "404.html",
        "500.html",
        "auth/login.html",
        "auth/signup.html",
        "auth/reset.html",
        "auth/new-password.html",
        "shop/index.html",
        "shop/product-list.html",
        "shop/product-detail.html",
        "shop/cart.html",
        "shop/checkout.html",
        "shop/orders.html",
        "admin/edit-product.html",
        "admin/products.html",
    ] {
        assert!(views.has_template(name), "missing template {}", name);
    }
}

#[test]
fn test_render_login_page() {
    let views = ViewEngine::embedded().unwrap();
    let html = views.render("auth/login.html", &page_context("Login")).unwrap();
    assert!(html.contains("<title>Login</title>"));
    assert!(html.contains(r#"name="_csrf" value="token123""#));
    assert!(!html.contains("user-message--error"));
}

#[test]
fn test_error_message_is_escaped() {
    let views = ViewEngine::embedded().unwrap();
    let mut context = page_context("Login");
    context.insert("error_message", "<script>alert(1)</script>");
    let html = views.render("auth/login.html", &context).unwrap();
    assert!(html.contains("user-message--error"));
    assert!(!html.contains("<script>alert(1)</script>"));
}

#[test]
fn test_invalid_fields_are_marked() {
    let views = ViewEngine::embedded().unwrap();
    let mut context = page_context("Signup");
    context.insert("validation_fields", &vec!["confirmPassword"]);
    let html = views.render("auth/signup.html", &context).unwrap();
    assert_eq!(html.matches(r#"class="invalid""#).count(), 1);
}

#[test]
fn test_money_filter() {
    let views = ViewEngine::embedded().unwrap();
    let mut context = page_context("Checkout");
    context.insert("lines", &Vec::<serde_json::Value>::new());
    context.insert("total_cents", &1999);
    let html = views.render("shop/checkout.html", &context).unwrap();
    assert!(html.contains("Total: $19.99"));

    assert!(money_filter(&json!("abc"), &HashMap::new()).is_err());
    assert_eq!(money_filter(&json!(5), &HashMap::new()).unwrap(), json!("0.05"));
}

#[test]
fn test_render_missing_template_fails() {
    let views = ViewEngine::embedded().unwrap();
    let err = views.render("nope.html", &page_context("x")).unwrap_err();
    assert!(err.to_string().contains("nope.html"));
}

#[test]
fn test_render_or_fallback() {
    let views = ViewEngine::embedded().unwrap();
    let html = views.render_or_fallback("nope.html", &page_context("x"));
    assert!(html.contains("Something went wrong"));
}

#[test]
fn test_from_dir_loads_nested_templates() {
    let temp = tempfile::tempdir().unwrap();
    fs::create_dir_all(temp.path().join("shop")).unwrap();
    fs::write(temp.path().join("base.html"), "<main>{% block content %}{% endblock content %}</main>").unwrap();
    fs::write(
        temp.path().join("shop").join("index.html"),
        r#"{% extends "base.html" %}{% block content %}{{ page_title }}{% endblock content %}"#,
    )
    .unwrap();
    fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

    let views = ViewEngine::from_dir(temp.path()).unwrap();
    assert!(views.has_template("shop/index.html"));
    assert!(!views.has_template("notes.txt"));
    assert_eq!(
        views.render("shop/index.html", &page_context("Hello")).unwrap(),
        "<main>Hello</main>"
    );
}

#[test]
fn test_from_dir_without_templates_fails() {
    let temp = tempfile::tempdir().unwrap();
    assert!(ViewEngine::from_dir(temp.path()).is_err());
}

#[test]
fn test_from_config_prefers_directory() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("only.html"), "only").unwrap();

    let views = ViewEngine::from_config(&ViewsConfig {
        path: Some(temp.path().to_path_buf()),
    })
    .unwrap();
    assert!(views.has_template("only.html"));
    assert!(!views.has_template("base.html"));

    let views = ViewEngine::from_config(&ViewsConfig::default()).unwrap();
    assert!(views.has_template("base.html"));
}

#[test]
fn test_simple_error_page_escapes() {
    let html = simple_error_page("Oops", "<b>bad</b>");
    assert!(html.contains("<title>Oops</title>"));
    assert!(!html.contains("<b>bad</b>"));
}
