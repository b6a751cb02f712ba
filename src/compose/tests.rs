use std::cell::{Cell, RefCell};

use serde_json::json;

use super::*;

fn tracer(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> impl Fn(&mut Instance, &Super<'_>, &[Value]) -> MethodResult {
    let log = Rc::clone(log);
    move |this, sup, args| {
        log.borrow_mut().push(tag.to_string());
        if sup.exists() {
            sup.call(this, args)
        } else {
            Ok(json!(tag))
        }
    }
}

fn compose(
    composer: &TypeComposer,
    types: &mut NamespaceRegistry<Rc<ComposedType>>,
    name: &str,
    extends: Option<&str>,
    members: Members,
    binding: SuperBinding,
) -> Rc<ComposedType> {
    let ty = composer
        .compose(
            Composition {
                name: name.to_string(),
                extends: extends.map(str::to_string),
                body: members.into(),
                binding,
                ..Composition::default()
            },
            types,
        )
        .unwrap();
    types.assign(name, Rc::clone(&ty)).unwrap();
    ty
}

#[test]
fn test_super_calls_nest_most_derived_first() {
    let composer = TypeComposer::new();
    let mut types = NamespaceRegistry::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    compose(
        &composer,
        &mut types,
        "A",
        None,
        Members::new().with_method("m", tracer(&log, "A")),
        SuperBinding::Overrides,
    );
    compose(
        &composer,
        &mut types,
        "B",
        Some("A"),
        Members::new().with_method("m", tracer(&log, "B")),
        SuperBinding::Overrides,
    );
    let c = compose(
        &composer,
        &mut types,
        "C",
        Some("B"),
        Members::new().with_method("m", tracer(&log, "C")),
        SuperBinding::Overrides,
    );

    let mut obj = c.instantiate(&[]).unwrap();
    let out = obj.call("m", &[]).unwrap();
    assert_eq!(out, json!("A"));
    assert_eq!(*log.borrow(), vec!["C", "B", "A"]);
    assert_eq!(c.method_owners("m"), vec!["C", "B", "A"]);
}

#[test]
fn test_super_does_not_leak_between_calls() {
    let composer = TypeComposer::new();
    let mut types = NamespaceRegistry::new();

    compose(
        &composer,
        &mut types,
        "A",
        None,
        Members::new()
            .with_method("m", |_, _, _| Ok(json!("A.m")))
            .with_method("other", |_, sup, _| Ok(json!(sup.exists()))),
        SuperBinding::Overrides,
    );
    let b = compose(
        &composer,
        &mut types,
        "B",
        Some("A"),
        Members::new().with_method("m", |this, sup, args| {
            let inner = sup.call(this, args)?;
            // A sibling call made while `m` is running sees its own chain.
            let other = this.call("other", &[])?;
            Ok(json!([inner, other]))
        }),
        SuperBinding::Overrides,
    );

    let mut obj = b.instantiate(&[]).unwrap();
    assert_eq!(obj.call("m", &[]).unwrap(), json!(["A.m", false]));
    assert_eq!(obj.call("other", &[]).unwrap(), json!(false));
}

#[test]
fn test_super_chain_survives_errors() {
    let composer = TypeComposer::new();
    let mut types = NamespaceRegistry::new();
    let calls = Rc::new(Cell::new(0));

    let counter = Rc::clone(&calls);
    compose(
        &composer,
        &mut types,
        "A",
        None,
        Members::new().with_method("m", move |_, _, args| {
            counter.set(counter.get() + 1);
            if args.is_empty() {
                Err(CallError::failed("boom"))
            } else {
                Ok(json!("ok"))
            }
        }),
        SuperBinding::Initializer,
    );
    let b = compose(
        &composer,
        &mut types,
        "B",
        Some("A"),
        Members::new().with_method("m", |this, sup, args| sup.call(this, args)),
        SuperBinding::Overrides,
    );

    let mut obj = b.instantiate(&[]).unwrap();
    assert_eq!(obj.call("m", &[]), Err(CallError::failed("boom")));
    assert_eq!(obj.call("m", &[json!(1)]), Ok(json!("ok")));
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_undecorated_override_is_not_super_bound() {
    let composer = TypeComposer::new();
    let mut types = NamespaceRegistry::new();
    compose(
        &composer,
        &mut types,
        "A",
        None,
        Members::new().with_method("m", |_, _, _| Ok(json!(1))),
        SuperBinding::Initializer,
    );
    let b = compose(
        &composer,
        &mut types,
        "B",
        Some("A"),
        Members::new().with_method("m", |this, sup, args| sup.call(this, args)),
        SuperBinding::Initializer,
    );

    let mut obj = b.instantiate(&[]).unwrap();
    assert_eq!(
        obj.call("m", &[]),
        Err(CallError::SuperUnbound {
            owner: "B".to_string(),
            method: "m".to_string(),
        })
    );
}

#[test]
fn test_member_policy_binds_named_members_only() {
    let composer = TypeComposer::new();
    let mut types = NamespaceRegistry::new();
    compose(
        &composer,
        &mut types,
        "A",
        None,
        Members::new()
            .with_method("draw", |_, _, _| Ok(json!("A.draw")))
            .with_method("tick", |_, _, _| Ok(json!("A.tick"))),
        SuperBinding::Initializer,
    );
    let policy = SuperBinding::Members(["draw".to_string()].into_iter().collect());
    let b = compose(
        &composer,
        &mut types,
        "B",
        Some("A"),
        Members::new()
            .with_method("draw", |this, sup, args| sup.call(this, args))
            .with_method("tick", |this, sup, args| sup.call(this, args)),
        policy,
    );

    let mut obj = b.instantiate(&[]).unwrap();
    assert_eq!(obj.call("draw", &[]), Ok(json!("A.draw")));
    assert!(matches!(
        obj.call("tick", &[]),
        Err(CallError::SuperUnbound { .. })
    ));
}

#[test]
fn test_new_method_super_has_nothing_to_call() {
    let composer = TypeComposer::new();
    let mut types = NamespaceRegistry::new();
    let a = compose(
        &composer,
        &mut types,
        "A",
        None,
        Members::new().with_method("m", |this, sup, args| sup.call(this, args)),
        SuperBinding::Members(["m".to_string()].into_iter().collect()),
    );
    let mut obj = a.instantiate(&[]).unwrap();
    assert_eq!(
        obj.call("m", &[]),
        Err(CallError::NoSuperMethod {
            method: "m".to_string()
        })
    );
}

#[test]
fn test_inherited_members_are_unchanged() {
    let composer = TypeComposer::new();
    let mut types = NamespaceRegistry::new();
    compose(
        &composer,
        &mut types,
        "A",
        None,
        Members::new().with_method("name", |_, sup, _| Ok(json!(sup.owner()))),
        SuperBinding::Initializer,
    );
    let b = compose(
        &composer,
        &mut types,
        "B",
        Some("A"),
        Members::new(),
        SuperBinding::Overrides,
    );
    let mut obj = b.instantiate(&[]).unwrap();
    assert_eq!(obj.call("name", &[]).unwrap(), json!("A"));
    assert_eq!(b.method_owners("name"), vec!["A"]);
    assert!(obj.is_a("A"));
    assert!(obj.is_a("B"));
    assert!(!obj.is_a("C"));
}

#[test]
fn test_defaults_merge_and_initializer_chain() {
    let composer = TypeComposer::new();
    let mut types = NamespaceRegistry::new();
    let inits = Rc::new(Cell::new(0));

    let count = Rc::clone(&inits);
    compose(
        &composer,
        &mut types,
        "Shape",
        None,
        Members::new()
            .with_default("x", json!(0))
            .with_default("y", json!(0))
            .with_method("init", move |this, _, args| {
                count.set(count.get() + 1);
                if let Some(x) = args.first() {
                    this.set("x", x.clone());
                }
                Ok(Value::Null)
            }),
        SuperBinding::Initializer,
    );
    let circle = compose(
        &composer,
        &mut types,
        "Circle",
        Some("Shape"),
        Members::new()
            .with_default("y", json!(5))
            .with_default("r", json!(1))
            .with_method("init", |this, sup, args| {
                sup.call(this, args)?;
                this.set("r", json!(2));
                Ok(Value::Null)
            }),
        SuperBinding::Initializer,
    );

    // Composition alone never runs an initializer.
    assert_eq!(inits.get(), 0);
    assert_eq!(circle.defaults().get("y"), Some(&json!(5)));
    assert_eq!(circle.defaults().get("r"), Some(&json!(1)));

    let obj = circle.instantiate(&[json!(9)]).unwrap();
    assert_eq!(inits.get(), 1);
    assert_eq!(obj.get("x"), Some(&json!(9)));
    assert_eq!(obj.get("y"), Some(&json!(5)));
    assert_eq!(obj.get("r"), Some(&json!(2)));

    // The table is copied, not shared.
    assert_eq!(circle.defaults().get("r"), Some(&json!(1)));
}

#[test]
fn test_initializer_end_of_chain_is_a_no_op() {
    let composer = TypeComposer::new();
    let mut types = NamespaceRegistry::new();
    let ty = compose(
        &composer,
        &mut types,
        "Root",
        None,
        Members::new().with_method("init", |this, sup, args| {
            sup.call(this, args)?;
            this.set("ready", json!(true));
            Ok(Value::Null)
        }),
        SuperBinding::Initializer,
    );
    let obj = ty.instantiate(&[]).unwrap();
    assert_eq!(obj.get("ready"), Some(&json!(true)));
}

#[test]
fn test_custom_initializer_name() {
    let composer = TypeComposer::with_initializer("initialize");
    let mut types = NamespaceRegistry::new();
    let ty = compose(
        &composer,
        &mut types,
        "T",
        None,
        Members::new().with_method("initialize", |this, _, _| {
            this.set("done", json!(1));
            Ok(Value::Null)
        }),
        SuperBinding::Initializer,
    );
    assert_eq!(ty.initializer(), "initialize");
    assert_eq!(ty.instantiate(&[]).unwrap().get("done"), Some(&json!(1)));
}

#[test]
fn test_factory_runs_at_composition() {
    let composer = TypeComposer::new();
    let types = NamespaceRegistry::new();
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);
    let ty = composer
        .compose(
            Composition {
                name: "F".to_string(),
                body: ExtensionBody::factory(move || {
                    flag.set(true);
                    Members::new().with_default("k", json!("v"))
                }),
                ..Composition::default()
            },
            &types,
        )
        .unwrap();
    assert!(ran.get());
    assert_eq!(ty.defaults().get("k"), Some(&json!("v")));
}

#[test]
fn test_unknown_base_does_not_run_factory() {
    let composer = TypeComposer::new();
    let types = NamespaceRegistry::new();
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);
    let err = composer
        .compose(
            Composition {
                name: "B".to_string(),
                extends: Some("Missing".to_string()),
                body: ExtensionBody::factory(move || {
                    flag.set(true);
                    Members::new()
                }),
                ..Composition::default()
            },
            &types,
        )
        .unwrap_err();
    assert_eq!(
        err,
        ComposeError::UnknownBase {
            name: "B".to_string(),
            base: "Missing".to_string()
        }
    );
    assert!(!ran.get());
}

#[test]
fn test_constants_live_on_the_type() {
    let composer = TypeComposer::new();
    let types = NamespaceRegistry::new();
    let mut constants = BTreeMap::new();
    constants.insert("SIDES".to_string(), json!(4));
    let ty = composer
        .compose(
            Composition {
                name: "Square".to_string(),
                constants,
                aliases: vec!["Sq".to_string()],
                ..Composition::default()
            },
            &types,
        )
        .unwrap();
    assert_eq!(ty.constant("SIDES"), Some(&json!(4)));
    assert_eq!(ty.aliases(), ["Sq".to_string()]);
    let obj = ty.instantiate(&[]).unwrap();
    assert_eq!(obj.get("SIDES"), None);
}

#[test]
fn test_unknown_method() {
    let composer = TypeComposer::new();
    let types = NamespaceRegistry::new();
    let ty = composer
        .compose(
            Composition {
                name: "Empty".to_string(),
                ..Composition::default()
            },
            &types,
        )
        .unwrap();
    let mut obj = ty.instantiate(&[]).unwrap();
    assert_eq!(
        obj.call("nope", &[]),
        Err(CallError::UnknownMethod {
            ty: "Empty".to_string(),
            method: "nope".to_string()
        })
    );
}

#[test]
fn test_binding_policy_from_decorated() {
    assert_eq!(SuperBinding::from_decorated(true), SuperBinding::Overrides);
    assert_eq!(SuperBinding::from_decorated(false), SuperBinding::Initializer);
    assert!(SuperBinding::Initializer.binds("init", "init", false));
    assert!(!SuperBinding::Initializer.binds("m", "init", true));
    assert!(SuperBinding::Overrides.binds("m", "init", true));
    assert!(!SuperBinding::Overrides.binds("m", "init", false));
}
