use super::*;

struct Foo;

impl Panel for Foo {
    fn tab(&self, _cx: &RequestInfo) -> Result<String, PanelError> {
        Ok("foo".into())
    }

    fn panel(&self, _cx: &RequestInfo) -> Result<String, PanelError> {
        Ok("<p>foo</p>".into())
    }
}

struct Labeled(&'static str);

impl Panel for Labeled {
    fn tab(&self, _cx: &RequestInfo) -> Result<String, PanelError> {
        Ok(self.0.into())
    }

    fn panel(&self, _cx: &RequestInfo) -> Result<String, PanelError> {
        Ok(String::new())
    }
}

fn tab_of(panel: &Arc<dyn Panel>) -> String {
    panel.tab(&RequestInfo::default()).unwrap()
}

// =============================================================================
// id derivation
// =============================================================================

#[test]
fn same_type_without_ids_gets_suffixed() {
    let mut reg = PanelRegistry::new();
    assert_eq!(reg.add_panel(Arc::new(Foo), None), "Foo");
    assert_eq!(reg.add_panel(Arc::new(Foo), None), "Foo-2");
    assert_eq!(reg.add_panel(Arc::new(Foo), None), "Foo-3");
    assert_eq!(reg.len(), 3);
}

#[test]
fn derived_id_skips_explicitly_taken_suffix() {
    let mut reg = PanelRegistry::new();
    reg.add_panel(Arc::new(Foo), None);
    reg.add_panel(Arc::new(Labeled("x")), Some("Foo-2"));
    assert_eq!(reg.add_panel(Arc::new(Foo), None), "Foo-3");
}

#[test]
fn short_type_name_strips_path_and_generics() {
    assert_eq!(short_type_name("my_app::panels::Timer"), "Timer");
    assert_eq!(short_type_name("my_app::Wrapper<alloc::string::String>"), "Wrapper");
    assert_eq!(short_type_name("Plain"), "Plain");
}

#[test]
fn type_name_reports_concrete_type() {
    let panel: Arc<dyn Panel> = Arc::new(Foo);
    assert_eq!(short_type_name(panel.type_name()), "Foo");
}

// =============================================================================
// explicit ids
// =============================================================================

#[test]
fn explicit_id_overwrites_in_place() {
    let mut reg = PanelRegistry::new();
    reg.add_panel(Arc::new(Labeled("first")), Some("a"));
    reg.add_panel(Arc::new(Labeled("second")), Some("b"));
    reg.add_panel(Arc::new(Labeled("replaced")), Some("a"));

    assert_eq!(reg.len(), 2);
    let ids: Vec<&str> = reg.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(tab_of(&reg.get_panel("a").unwrap()), "replaced");
}

#[test]
fn get_panel_missing_returns_none() {
    let reg = PanelRegistry::new();
    assert!(reg.get_panel("nope").is_none());
    assert!(reg.is_empty());
}

#[test]
fn iteration_follows_registration_order() {
    let mut reg = PanelRegistry::new();
    reg.add_panel(Arc::new(Labeled("1")), Some("z"));
    reg.add_panel(Arc::new(Labeled("2")), Some("a"));
    reg.add_panel(Arc::new(Labeled("3")), Some("m"));
    let tabs: Vec<String> = reg.iter().map(|e| tab_of(&e.panel)).collect();
    assert_eq!(tabs, ["1", "2", "3"]);
}
