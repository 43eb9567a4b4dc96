//! End-to-end scenarios against the in-memory driver.
//!
//! Each scenario scripts a page the way a real application behaves
//! (lazy loading, re-rendering, frames) and drives it through the public
//! wrappers only.

use proptest::prelude::*;
use spot_web::prelude::*;
use spot_web::{ElementId, MockDom, MockDriver, MockNode};
use std::cell::RefCell;
use std::rc::Rc;

fn config() -> ScenarioConfig {
    ScenarioConfig::new()
        .with_timeout(200)
        .with_short_timeout(60)
        .with_open_page_timeout(200)
        .with_poll_interval(5)
}

fn tree_node(label: &str) -> MockNode {
    MockNode::new("li").id(format!("n-{label}")).child(
        MockNode::new("div")
            .class("row")
            .child(MockNode::new("span").class("toggle").id(format!("t-{label}")))
            .child(MockNode::new("span").class("label").text(label)),
    )
}

fn tree_leaf(label: &str) -> MockNode {
    MockNode::new("li").child(
        MockNode::new("div")
            .class("row")
            .child(MockNode::new("span").class("label").text(label)),
    )
}

/// Show or hide the pre-rendered children of `label` on each toggle click
fn toggle_children_on_click(driver: &MockDriver, label: &str) {
    let toggle = driver.find_first(&By::id(format!("t-{label}"))).unwrap();
    let container = driver.find_first(&By::id(format!("c-{label}"))).unwrap();
    let mut open = false;
    driver
        .on_click(&toggle, move |dom: &mut MockDom| {
            open = !open;
            let _ = dom.set_hidden(&container, !open);
        })
        .unwrap();
}

/// Make `label`'s children appear on first expansion, like a server round trip
fn load_children_on_expand(driver: &MockDriver, label: &str, children: Vec<MockNode>) {
    let node = driver.find_first(&By::id(format!("n-{label}"))).unwrap();
    let toggle = driver.find_first(&By::id(format!("t-{label}"))).unwrap();
    let mut pending = Some(children);
    let mut container: Option<ElementId> = None;
    let mut open = false;
    driver
        .on_click(&toggle, move |dom: &mut MockDom| {
            open = !open;
            if let Some(children) = pending.take() {
                container = dom.append(&node, MockNode::new("ul").children(children)).ok();
            } else if let Some(container) = &container {
                let _ = dom.set_hidden(container, !open);
            }
        })
        .unwrap();
}

// === Lazily loaded tree ===

mod lazy_tree_tests {
    use super::*;

    fn reports_tree() -> (MockDriver, SpotTreeElement) {
        let reports = tree_node("Reports").child(
            MockNode::new("ul")
                .id("c-Reports")
                .hidden()
                .children([tree_node("2024"), tree_leaf("Draft")]),
        );
        let driver = MockDriver::with_nodes(vec![MockNode::new("ul")
            .id("tree")
            .children([reports, tree_leaf("Settings")])]);
        toggle_children_on_click(&driver, "Reports");
        load_children_on_expand(&driver, "2024", vec![tree_leaf("Q1"), tree_leaf("Q2")]);

        let browser = WebBrowser::new(driver.clone(), config());
        let tree = SpotTreeElement::new(
            browser.find_element(&By::id("tree")).unwrap(),
            TreeLocators::default(),
        );
        (driver, tree)
    }

    #[test]
    fn test_search_expands_lazily_loaded_levels() {
        let (_driver, tree) = reports_tree();
        let q2 = tree.search_node("/Reports/2024/Q2").unwrap();
        assert_eq!(q2.label().unwrap(), "Q2");
        assert_eq!(q2.path().unwrap(), "/Reports/2024/Q2");
        assert_eq!(q2.depth(), 2);

        let reports = tree.root("Reports").unwrap().unwrap();
        assert!(reports.is_expanded().unwrap());
    }

    #[test]
    fn test_collapse_and_expand_again_keeps_loaded_children() {
        let (driver, tree) = reports_tree();
        let year = tree.search_node("/Reports/2024").unwrap();
        assert!(!year.is_expanded().unwrap());
        let labels = |node: &SpotTreeNodeElement| -> Vec<String> {
            node.children()
                .unwrap()
                .iter()
                .map(|child| child.label().unwrap())
                .collect()
        };
        assert_eq!(labels(&year), vec!["Q1", "Q2"]);

        year.collapse().unwrap();
        assert!(!year.is_expanded().unwrap());
        assert_eq!(labels(&year), vec!["Q1", "Q2"]);
        assert_eq!(driver.call_count("click"), 4);
    }

    #[test]
    fn test_find_by_label_loads_on_the_way_down() {
        let (_driver, tree) = reports_tree();
        let q1 = tree.find_node_by_label("Q1", 3).unwrap().unwrap();
        assert_eq!(q1.path().unwrap(), "/Reports/2024/Q1");
        assert!(tree.find_node_by_label("Q1", 2).unwrap().is_none());
    }

    #[test]
    fn test_relative_navigation_between_branches() {
        let (_driver, tree) = reports_tree();
        let q1 = tree.search_node("/Reports/2024/Q1").unwrap();
        let draft = q1.search_node("../../Draft").unwrap();
        assert_eq!(draft.path().unwrap(), "/Reports/Draft");

        let err = tree.search_node("/Reports/Missing").unwrap_err();
        assert!(matches!(err, SpotError::NodeNotFound { .. }));
    }
}

// === Tables that re-render ===

mod table_tests {
    use super::*;

    fn users(rows: &[(&str, &str)]) -> MockNode {
        MockNode::new("table")
            .id("users")
            .child(
                MockNode::new("thead").child(
                    MockNode::new("tr")
                        .child(MockNode::new("th").text("Name"))
                        .child(MockNode::new("th").text("Email")),
                ),
            )
            .child(MockNode::new("tbody").children(rows.iter().map(|(name, email)| {
                MockNode::new("tr")
                    .child(MockNode::new("td").text(*name))
                    .child(MockNode::new("td").text(*email))
            })))
    }

    #[test]
    fn test_table_survives_rerender() {
        let driver = MockDriver::with_nodes(vec![users(&[("Ann", "ann@x.io")])]);
        let browser = WebBrowser::new(driver.clone(), config());
        let table = SpotTableElement::new(browser.find_element(&By::id("users")).unwrap());
        assert_eq!(table.cell_text(0, "email").unwrap(), "ann@x.io");

        let old = driver.find_first(&By::id("users")).unwrap();
        driver
            .with_dom(|dom| dom.replace(&old, users(&[("Bea", "bea@x.io"), ("Cal", "cal@x.io")])))
            .unwrap();

        assert_eq!(table.column_values("Name").unwrap(), vec!["Bea", "Cal"]);
        assert_eq!(table.find_row("Email", "cal@x.io").unwrap(), Some(1));
    }

    #[test]
    fn test_rows_loaded_by_button() {
        let driver = MockDriver::with_nodes(vec![
            users(&[("Ann", "ann@x.io")]),
            MockNode::new("button").id("more").text("More"),
        ]);
        let body = driver.find_first(&By::css("#users tbody")).unwrap();
        let more = driver.find_first(&By::id("more")).unwrap();
        driver
            .on_click(&more, move |dom: &mut MockDom| {
                let _ = dom.append(
                    &body,
                    MockNode::new("tr")
                        .child(MockNode::new("td").text("Dan"))
                        .child(MockNode::new("td").text("dan@x.io")),
                );
            })
            .unwrap();

        let browser = WebBrowser::new(driver, config());
        let table = SpotTableElement::new(browser.find_element(&By::id("users")).unwrap());
        assert!(matches!(
            table.wait_for_rows(2, Some(30)),
            Err(SpotError::Timeout { ms: 30, .. })
        ));

        browser.find_element(&By::id("more")).unwrap().click().unwrap();
        assert_eq!(table.wait_for_rows(2, None).unwrap(), 2);
        assert_eq!(
            table.find_row_matching(&[("Name", "Dan"), ("Email", "dan@x.io")]).unwrap(),
            Some(1)
        );
    }
}

// === Widgets inside frames ===

mod frame_tests {
    use super::*;

    fn settings_page() -> Vec<MockNode> {
        vec![
            MockNode::new("h1").id("title").text("Settings"),
            MockNode::iframe(
                "settings",
                vec![
                    MockNode::new("select").id("color").children([
                        MockNode::new("option").attr("value", "r").text("Red").selected(),
                        MockNode::new("option").attr("value", "g").text("Green"),
                    ]),
                    MockNode::iframe(
                        "prefs",
                        vec![MockNode::new("input").id("notify").attr("type", "checkbox")],
                    )
                    .id("prefs-frame"),
                ],
            ),
        ]
    }

    #[test]
    fn test_widgets_in_different_frames() {
        let driver = MockDriver::with_nodes(settings_page());
        let browser = WebBrowser::new(driver.clone(), config());
        let settings = WebFrame::named("settings");
        let prefs = WebFrame::embedded(By::id("prefs-frame")).within(settings.clone());

        let color = SpotSelectElement::new(
            browser.find_element_in(Some(&settings), &By::id("color")).unwrap(),
        )
        .unwrap();
        let notify = SpotSelectableElement::new(
            browser.find_element_in(Some(&prefs), &By::id("notify")).unwrap(),
            SelectionMarker::Native,
        );
        let title = browser.find_element(&By::id("title")).unwrap();

        color.select_by_text("Green").unwrap();
        assert_eq!(title.text().unwrap(), "Settings");
        notify.select().unwrap();
        assert!(notify.is_selected().unwrap());
        assert_eq!(driver.frame_depth(), 2);
        assert_eq!(color.selected_option().unwrap().as_deref(), Some("Green"));
        assert_eq!(browser.current_frame(), Some(settings));
        assert_eq!(driver.frame_depth(), 1);
    }

    #[test]
    fn test_wait_for_text_inside_frame() {
        let driver = MockDriver::with_nodes(vec![MockNode::iframe(
            "log",
            vec![MockNode::new("p").id("status").text("Working")],
        )]);
        let browser = WebBrowser::new(driver.clone(), config());
        let log = WebFrame::named("log");
        assert!(browser
            .wait_for_text(Some(&log), &By::id("status"), "Done", Some(25))
            .is_err());

        let status = driver.find_first(&By::id("status")).unwrap();
        driver.with_dom(|dom| dom.set_text(&status, "Done")).unwrap();
        let found = browser
            .wait_for_text(Some(&log), &By::id("status"), "Done", None)
            .unwrap();
        assert_eq!(found.frame(), Some(&log));
    }
}

// === Sessions ===

mod session_tests {
    use super::*;

    #[derive(Default)]
    struct PasswordForm {
        submitted: RefCell<Vec<String>>,
    }

    impl LoginForm for PasswordForm {
        fn login(&self, browser: &Rc<WebBrowser>, user: &User) -> SpotResult<()> {
            browser.find_element(&By::name("user"))?.set_text(&user.id)?;
            browser.find_element(&By::name("password"))?.set_text(&user.password)?;
            browser.find_element(&By::id("submit"))?.click()?;
            self.submitted.borrow_mut().push(user.id.clone());
            browser.open("/home")
        }

        fn logout(&self, browser: &Rc<WebBrowser>) -> SpotResult<()> {
            browser.open("/login")
        }
    }

    fn app() -> ScenarioSession {
        let driver = MockDriver::new();
        driver.add_page(
            "http://crm.local/login",
            vec![
                MockNode::new("input").attr("name", "user"),
                MockNode::new("input").attr("name", "password").attr("type", "password"),
                MockNode::new("button").id("submit"),
            ],
        );
        driver.add_page("http://crm.local/home", vec![MockNode::new("nav").id("menu")]);
        driver.add_page(
            "http://crm.local/accounts/12",
            vec![MockNode::new("h1").id("account").text("Account 12")],
        );
        let config = config()
            .with_base_url("http://crm.local")
            .with_parameter("crm.url", "http://crm.local")
            .with_parameter("crm.login", "/login")
            .with_parameter("sales.id", "jo")
            .with_parameter("sales.password", "pw");
        let application = Application::from_config(&config, "crm").unwrap();
        ScenarioSession::new(WebBrowser::new(driver, config), application)
    }

    #[test]
    fn test_login_then_browse() {
        let mut session = app();
        let form = PasswordForm::default();
        let user = User::from_config(session.browser().config(), "sales").unwrap();

        session.login(&user, &form).unwrap();
        session.login(&user, &form).unwrap();
        assert_eq!(form.submitted.borrow().len(), 1);
        assert_eq!(session.logged_user().map(|u| u.id.as_str()), Some("jo"));

        let home = SimplePage::new("Home", "/home").with_load_indicator(By::id("menu"));
        let account = SimplePage::new("Account", "/accounts/:id")
            .with_load_indicator(By::id("account"));
        session.open_page(&home).unwrap();
        session.open_page_at(&account, "/accounts/12").unwrap();
        assert_eq!(session.current_page_name(), Some("Account"));

        let params = UrlMatcher::new(account.url_pattern())
            .unwrap()
            .params(&session.browser().url().unwrap());
        assert_eq!(params.get("id").map(String::as_str), Some("12"));

        assert_eq!(session.back().unwrap().name, "Home");
        session.logout(&form).unwrap();
        assert!(session.logged_user().is_none());
        session.close().unwrap();
    }

    #[test]
    fn test_wrong_page_is_reported() {
        let mut session = app();
        let account = SimplePage::new("Account", "/accounts/:id");
        let err = session.open_page_at(&account, "/home").unwrap_err();
        assert!(!err.to_string().is_empty());
        assert!(session.history().is_empty());
    }
}

// === Configuration files ===

mod config_file_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "timeout_ms: 1500\nbase_url: http://crm.local\nparameters:\n  crm.name: CRM"
        )
        .unwrap();
        let config = ScenarioConfig::from_file(file.path()).unwrap();
        assert_eq!(config.timeout_ms, 1500);
        assert_eq!(config.poll_interval_ms, spot_web::DEFAULT_POLL_INTERVAL_MS);
        let app = Application::from_config(&config, "crm").unwrap();
        assert_eq!(app.name, "CRM");
        assert_eq!(app.base_url, "http://crm.local");
    }
}

// === XPath literals ===

proptest! {
    /// Any text, quotes included, can be matched through an xpath literal.
    #[test]
    fn prop_xpath_literal_matches_text(text in "[a-zA-Z'\"]{1,12}") {
        let driver = MockDriver::with_nodes(vec![
            MockNode::new("p").text(text.clone()),
            MockNode::new("p").text(format!("{text}-other")),
        ]);
        let browser = WebBrowser::new(driver, config());
        let by = By::xpath(format!("//p[text()={}]", xpath_literal(&text)));
        let found = browser.find_elements(&by).unwrap();
        prop_assert_eq!(found.len(), 1);
        prop_assert_eq!(found[0].text().unwrap(), text);
    }
}
