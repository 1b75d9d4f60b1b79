use pugjs::{Object, ToObject};
use std::fmt;

#[derive(ToObject)]
struct Product {
    product_name: String,
    #[object(rename = "cost")]
    price: f64,
    #[object(skip)]
    #[allow(dead_code)]
    secret: String,
    tags: Vec<String>,
}

#[derive(ToObject)]
#[object(display)]
struct Sku {
    code: String,
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SKU-{}", self.code)
    }
}

#[test]
fn test_derive_fields() {
    let product = Product {
        product_name: "pug".into(),
        price: 9.5,
        secret: "hidden".into(),
        tags: vec!["a".into(), "b".into()],
    };
    let obj = product.to_object();
    assert_eq!(obj.field("productName"), Object::string("pug"));
    assert_eq!(obj.field("cost"), Object::Number(9.5));
    assert!(obj.field("secret").is_nil());
    assert_eq!(obj.field("tags").to_string(), "a b");
}

#[test]
fn test_derive_display() {
    let obj = Sku { code: "42".into() }.to_object();
    assert_eq!(obj.to_string(), "SKU-42");
    assert_eq!(obj.field("code"), Object::string("42"));
}
