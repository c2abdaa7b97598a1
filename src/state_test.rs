use std::sync::Arc;

use super::*;
use crate::error::PanelError;

struct Static(&'static str);

impl Panel for Static {
    fn tab(&self, _cx: &RequestInfo) -> Result<String, PanelError> {
        Ok(self.0.to_owned())
    }

    fn panel(&self, _cx: &RequestInfo) -> Result<String, PanelError> {
        Ok(format!("<p>{}</p>", self.0))
    }
}

#[test]
fn new_bar_has_no_panels() {
    let bar = DebugBar::new(BarConfig::default()).unwrap();
    assert!(bar.panel_ids().is_empty());
    assert_eq!(bar.render(&RequestInfo::default(), PassKind::Ajax, "").panels, "");
}

#[test]
fn default_panels_register_info() {
    let bar = DebugBar::with_default_panels(BarConfig::default()).unwrap();
    assert_eq!(bar.panel_ids(), ["info"]);
}

#[test]
fn panels_added_through_clones_are_shared() {
    let bar = DebugBar::new(BarConfig::default()).unwrap();
    let clone = bar.clone();
    clone.add_panel(Arc::new(Static("one")), Some("one"));

    let partial = bar.render(&RequestInfo::default(), PassKind::Main, "");
    assert!(partial.bar.contains("one"));
    assert!(partial.panels.contains("<p>one</p>"));
}

#[test]
fn relay_follows_config() {
    let config = BarConfig { queue_capacity: 3, ..BarConfig::default() };
    let bar = DebugBar::new(config.clone()).unwrap();
    assert_eq!(*bar.relay(), Relay::from_config(&config));
    assert_eq!(bar.config().queue_capacity, 3);
}
