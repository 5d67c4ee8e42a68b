//! End-to-end migration of the legacy fixture project

use morph_core::{MigrationConfig, Orchestrator, Preflight, SkipReason, UnitOutcome};
use morph_test_utils::{fixtures, legacy_project, FixtureProject};
use pretty_assertions::assert_eq;

fn config() -> MigrationConfig {
    MigrationConfig::default().with_project(FixtureProject::host_config())
}

fn migrate(fixture: &FixtureProject, dry_run: bool) -> morph_core::RunReport {
    let config = config();
    let mut project = fixture.open();
    let orchestrator = Orchestrator::new(&config).unwrap().with_dry_run(dry_run);
    let stores = orchestrator.discover(&project, &[]);
    orchestrator.run(&mut project, &stores).unwrap()
}

#[test]
fn fixture_passes_preflight() {
    let fixture = legacy_project();
    let report = Preflight::run(&fixture.open(), &config());
    assert!(report.passed(), "{}", report.render_text());
    assert_eq!(report.units_checked, 5);
}

#[test]
fn declaration_unit_becomes_factories() {
    let fixture = legacy_project();
    migrate(&fixture, false);
    let text = fixture.read(fixtures::PRODUCTS_ACTIONS_PATH);

    assert!(text.starts_with("import { createAction, props } from '@ngrx/store';\n"));
    assert_eq!(text.matches("= createAction(").count(), 5);
    assert!(text.contains(
        "export const loadProduct = createAction('[Shopping] Load Product', props<{ payload: { sku: string } }>());"
    ));
    assert!(text.contains("/** loading a product failed */\nexport const loadProductFail = createAction("));
    assert!(text.contains("export const resetProducts = createAction('[Shopping] Reset Products');"));
    assert!(!text.contains("enum"));
    assert!(!text.contains("class"));
    assert!(!text.contains("ProductsAction ="));
    assert!(text.contains("import { HttpError } from 'ish-core/models/http-error/http-error.model';"));
}

#[test]
fn references_outside_the_store_are_rewritten() {
    let fixture = legacy_project();
    migrate(&fixture, false);
    let page = fixture.read(fixtures::PRODUCT_PAGE_PATH);

    assert!(page.contains("this.store.dispatch(loadProduct({ payload: { sku } }));"));
    assert!(page.contains("this.store.dispatch(loadProductFail({ payload: { error } }));"));
    assert!(page.contains(
        "import { loadProduct, loadProductFail } from 'ish-core/store/shopping/products/products.actions';"
    ));
    assert!(!page.contains("new Load"));
}

#[test]
fn reducer_becomes_registration_table() {
    let fixture = legacy_project();
    migrate(&fixture, false);
    let text = fixture.read(fixtures::PRODUCTS_REDUCER_PATH);

    assert_eq!(text.matches("\n  on(").count(), 3);
    assert!(text.contains("const reducer = createReducer(\n  initialState,\n  on(resetProducts, loadProduct, loadProductsByCategory, state => {"));
    assert!(text.contains("  on(loadProductFail, (state, action) => {"));
    assert!(text.contains("  on(loadProductSuccess, (state, action) => {\n      const { product } = action.payload;"));
    assert!(text.contains(
        "export function productsReducer(state = initialState, action: Action): ProductsState {\n  return reducer(state, action);\n}"
    ));
    assert!(!text.contains("switch"));
    assert!(!text.contains("ProductsActionTypes"));
    assert!(!text.contains("ReturnType"));
    for name in ["on", "Action", "createReducer"] {
        let line = text.lines().find(|l| l.ends_with("from '@ngrx/store';")).unwrap();
        assert!(line.contains(name), "{name} missing from {line}");
    }
}

#[test]
fn pipelines_are_wrapped() {
    let fixture = legacy_project();
    migrate(&fixture, false);
    let text = fixture.read(fixtures::PRODUCTS_EFFECTS_PATH);

    assert!(text.contains("  loadProduct$ = createEffect(() => this.actions$.pipe(\n    ofType(loadProduct),"));
    assert!(text.contains("map(product => loadProductSuccess({ payload: { product } }))"));
    assert!(text.contains("mapErrorToActionV8(loadProductFail)"));
    assert!(text.contains("ofType(loadProductFail),"));
    assert!(text.contains("iif<ApplyConfiguration, ApplyConfiguration>(() => this.productsService.verbose"));
    assert!(text.contains("), { dispatch: false });"));
    assert!(!text.contains("@Effect"));
    assert!(!text.contains("ProductsActionTypes"));
    assert!(text.contains("import { Actions, ofType, createEffect } from '@ngrx/effects';"));
    assert!(text.contains("import { mapErrorToActionV8 } from 'ish-core/utils/operators';"));
    assert!(text.contains("import { loadProductFail, loadProductSuccess, loadProduct } from './products.actions';"));
}

#[test]
fn loop_reducer_fails_while_siblings_complete() {
    let fixture = legacy_project();
    let report = migrate(&fixture, false);

    let orders = report.stores.iter().find(|s| s.name == "orders").unwrap();
    let Some(UnitOutcome::Failed { error }) = orders.reducer.as_ref().map(|u| &u.outcome) else {
        panic!("orders reducer should fail");
    };
    assert!(error.contains("ordersReducer"));
    assert!(error.contains("manual migration required"));
    assert!(matches!(
        orders.actions.as_ref().map(|u| &u.outcome),
        Some(UnitOutcome::Migrated { .. })
    ));

    let products = report.stores.iter().find(|s| s.name == "products").unwrap();
    assert!(products.units().all(|u| matches!(u.outcome, UnitOutcome::Migrated { .. })));
    assert!(report.has_failures());
    assert!(fixture.read(fixtures::ORDERS_REDUCER_PATH).contains("for (const handler of handlers)"));
}

#[test]
fn second_run_changes_nothing() {
    let fixture = legacy_project();
    migrate(&fixture, false);
    let before = fixture.read(fixtures::PRODUCTS_EFFECTS_PATH);

    let report = migrate(&fixture, false);
    assert!(report.changed.is_empty());
    assert!(report.written.is_empty());
    assert_eq!(report.counts().migrated, 0);
    let products = report.stores.iter().find(|s| s.name == "products").unwrap();
    assert!(products
        .units()
        .all(|u| u.outcome == UnitOutcome::Skipped { reason: SkipReason::AlreadyMigrated }));
    assert_eq!(fixture.read(fixtures::PRODUCTS_EFFECTS_PATH), before);
}

#[test]
fn dry_run_leaves_disk_untouched() {
    let fixture = legacy_project();
    let report = migrate(&fixture, true);

    assert!(report.written.is_empty());
    assert!(report.changed.len() >= 6);
    assert_eq!(fixture.read(fixtures::PRODUCTS_ACTIONS_PATH), fixtures::PRODUCTS_ACTIONS);
    assert_eq!(fixture.read(fixtures::PRODUCT_PAGE_PATH), fixtures::PRODUCT_PAGE);
}
