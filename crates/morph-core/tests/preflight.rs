//! Pre-flight gate over on-disk projects

use morph_core::{MigrationConfig, Preflight, Rule};
use morph_test_utils::{fixtures, legacy_project};

#[test]
fn namespace_import_in_store_fails_the_gate() {
    let fixture = legacy_project().with_file(
        "src/app/core/store/shopping/products/products.selectors.ts",
        "import * as fromProducts from './products.reducer';\n\nexport const getProducts = (s) => fromProducts.initialState;\n",
    );
    let config = MigrationConfig::default();
    let report = Preflight::run(&fixture.open(), &config);

    assert!(!report.passed());
    let violations: Vec<_> = report.of_rule(Rule::NoStarImportsInStore).collect();
    assert_eq!(violations.len(), 1);
    assert!(violations[0].unit.ends_with("products.selectors.ts"));
    assert!(report
        .render_text()
        .contains("products.selectors.ts:1: [no-star-imports-in-store]"));
}

#[test]
fn line_comment_on_action_class_fails_the_gate() {
    let actions = fixtures::PRODUCTS_ACTIONS.replace(
        "export class ResetProducts",
        "// clears everything\nexport class ResetProducts",
    );
    let fixture = legacy_project().with_file(fixtures::PRODUCTS_ACTIONS_PATH, &actions);
    let report = Preflight::run(&fixture.open(), &MigrationConfig::default());

    let found: Vec<_> = report.of_rule(Rule::ForceJsdocComments).collect();
    assert_eq!(found.len(), 1);
    assert!(found[0].message.contains("ResetProducts"));
}

#[test]
fn spec_files_are_not_checked() {
    let fixture = legacy_project().with_file(
        "src/app/core/store/shopping/products/products.effects.spec.ts",
        "import * as sinon from 'sinon';\n",
    );
    let report = Preflight::run(&fixture.open(), &MigrationConfig::default());
    assert!(report.passed(), "{}", report.render_text());
}
