use schema_model::error::ViolationKind;
use schema_model::format::{Scalar, ScalarType};
use schema_model::model::{ModelKind, ModelSet, TypeRef};
use schema_model::{compile, load_str};
use serde_json::json;

const PETSTORE: &str = include_str!("fixtures/petstore_v2.json");
const POLYMORPHISM: &str = include_str!("fixtures/polymorphism_v3.json");

fn petstore() -> ModelSet {
    compile(&load_str(PETSTORE).unwrap()).unwrap()
}

fn polymorphism() -> ModelSet {
    compile(&load_str(POLYMORPHISM).unwrap()).unwrap()
}

// ---- Swagger 2.0 petstore ---- //

#[test]
fn petstore_compiles_every_definition() {
    let models = petstore();
    for name in ["ApiResponse", "Category", "Pet", "Tag", "Order", "User"] {
        assert!(matches!(models.root(name), Some(TypeRef::Model(_))), "{name} should be a model");
    }
    let pet = models.model(models.find("Pet").unwrap());
    assert!(pet.field("name").unwrap().required);
    assert!(pet.field("photoUrls").unwrap().required);
    assert!(!pet.field("status").unwrap().required);
    assert_eq!(
        pet.field("photoUrls").unwrap().ty,
        TypeRef::Array(Box::new(TypeRef::Scalar(ScalarType::Text)))
    );
    let order = models.model(models.find("Order").unwrap());
    assert_eq!(order.field("shipDate").unwrap().ty, TypeRef::Scalar(ScalarType::DateTime));
}

#[test]
fn petstore_accepts_a_well_formed_pet() {
    let models = petstore();
    let pet = models.find("Pet").unwrap();
    let category = models.find("Category").unwrap();
    let tag = models.find("Tag").unwrap();

    let dogz = models.construct(category, [("id", json!(101)), ("name", json!("dogz"))]).unwrap();
    let friendly = models.construct(tag, [("id", json!(102)), ("name", json!("friendly"))]).unwrap();
    let fido = models
        .construct(
            pet,
            [
                ("id", json!(99)),
                ("name", json!("fido")),
                ("status", json!("available")),
                ("category", dogz.to_json()),
                ("photoUrls", json!(["http://fido.jpg"])),
                ("tags", json!([friendly.to_json()])),
            ],
        )
        .unwrap();

    let fields = fido.as_object().unwrap();
    assert_eq!(fields.get("name").unwrap().as_scalar(), Some(&Scalar::Text("fido".into())));
    let category = fields.get("category").unwrap().as_object().unwrap();
    assert_eq!(models.model(category.model).name, "Category");
    assert_eq!(fido.to_json()["tags"][0]["name"], "friendly");
}

#[test]
fn petstore_rejects_a_scalar_category() {
    let models = petstore();
    let err = models
        .decode(
            models.root("Pet").unwrap(),
            &json!({ "name": "fodi", "photoUrls": [], "category": "involid" }),
        )
        .unwrap_err();
    assert_eq!(err.target, "Pet");
    assert_eq!(err.len(), 1);
    assert!(matches!(err.at("$.category")[0], ViolationKind::WrongType { found: "string", .. }));
}

#[test]
fn petstore_status_is_enum_checked() {
    let models = petstore();
    let err = models
        .decode(
            models.root("Pet").unwrap(),
            &json!({ "name": "foffy", "photoUrls": ["http://fido.jpg"], "status": "invalid" }),
        )
        .unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.starts_with("1 validation error for Pet"), "{rendered}");
    assert!(rendered.contains("$.status"), "{rendered}");
    assert!(rendered.contains("\"available\""), "{rendered}");
}

#[test]
fn petstore_order_round_trips() {
    let models = petstore();
    let input = json!({
        "id": 7,
        "petId": 99,
        "quantity": 1,
        "shipDate": "2024-05-01T12:30:00+02:00",
        "status": "placed",
        "complete": false
    });
    let order = models.decode(models.root("Order").unwrap(), &input).unwrap();
    assert_eq!(serde_json::to_value(&order).unwrap(), input);
}

// ---- OpenAPI 3 polymorphism ---- //

#[test]
fn tagged_union_variants_get_literal_tags() {
    let models = polymorphism();
    let cat = models.model(models.find("Cat").unwrap());
    let dog = models.model(models.find("Dog").unwrap());
    assert_eq!(cat.field("pet_type").unwrap().ty, TypeRef::Literal("cat".into()));
    assert_eq!(dog.field("pet_type").unwrap().ty, TypeRef::Literal("dog".into()));

    let pet = models.model(models.find("Pet").unwrap());
    let ModelKind::Union { tags, .. } = &pet.kind else { panic!("Pet is a union") };
    assert_eq!(tags.keys().collect::<Vec<_>>(), ["cat", "dog"]);
}

#[test]
fn household_decodes_mixed_pets() {
    let models = polymorphism();
    let household = models
        .decode(
            models.root("Household").unwrap(),
            &json!({
                "pets": [
                    { "pet_type": "cat", "born": "2020-02-29" },
                    { "pet_type": "dog", "name": "Rex", "chip": "123e4567-e89b-12d3-a456-426614174000" }
                ],
                "address": { "street": "1 Main St", "city": "Springfield" },
                "vet": "mailto:vet@example.com"
            }),
        )
        .unwrap();

    let fields = household.as_object().unwrap();
    let rendered = household.to_json();
    assert_eq!(rendered["pets"][0]["color"], "black", "defaults fill absent optional fields");
    assert_eq!(fields.get("vet").unwrap().variant_index(), Some(1));

    let serde_json::Value::Array(pets) = &rendered["pets"] else { panic!("pets is a list") };
    assert_eq!(pets.len(), 2);
}

#[test]
fn household_reports_every_violation() {
    let models = polymorphism();
    let err = models
        .decode(
            models.root("Household").unwrap(),
            &json!({
                "pets": [
                    { "pet_type": "fish" },
                    { "pet_type": "dog" },
                    { "pet_type": "cat", "born": "yesterday" }
                ],
                "address": { "street": "1 Main St" },
                "vet": 42
            }),
        )
        .unwrap_err();

    assert!(err.is_union_failure());
    assert!(matches!(err.at("$.pets[0].pet_type")[0], ViolationKind::UncoveredDiscriminator { .. }));
    assert_eq!(err.at("$.pets[1].name"), vec![&ViolationKind::MissingField]);
    assert!(matches!(err.at("$.pets[2].born")[0], ViolationKind::InvalidFormat { .. }));
    assert_eq!(err.at("$.address.city"), vec![&ViolationKind::MissingField]);
    assert!(matches!(err.at("$.vet")[0], ViolationKind::NoMatchingAlternative { attempts: 2, .. }));
    assert_eq!(err.len(), 5);
}

#[test]
fn recursive_tree_decodes_at_depth() {
    let models = polymorphism();
    let tree = json!({
        "label": "root",
        "children": [
            { "label": "a", "children": [ { "label": "a.1" } ] },
            { "label": "b", "children": [] }
        ]
    });
    let node = models.decode(models.root("TreeNode").unwrap(), &tree).unwrap();
    assert_eq!(node.to_json(), tree);

    let err = models
        .decode(models.root("TreeNode").unwrap(), &json!({ "label": "root", "children": [ { "children": [] } ] }))
        .unwrap_err();
    assert_eq!(err.at("$.children[0].label"), vec![&ViolationKind::MissingField]);
}

#[test]
fn compiled_models_validate_across_threads() {
    let models = std::sync::Arc::new(polymorphism());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let models = std::sync::Arc::clone(&models);
            std::thread::spawn(move || {
                let root = models.root("TreeNode").unwrap();
                models.decode(root, &json!({ "label": format!("n{i}") })).is_ok()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
