//! Testing utilities for the store-morph workspace
//!
//! On-disk fixture projects and a legacy store to migrate.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use morph_host::{HostConfig, Project};
use tempfile::TempDir;

/// Alias prefix used by the fixtures
pub const CORE_ALIAS: &str = "ish-core/";

/// Directory the alias points at
pub const CORE_DIR: &str = "src/app/core";

/// A project written to a temporary directory
#[derive(Debug)]
pub struct FixtureProject {
    dir: TempDir,
}

impl FixtureProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Write a file relative to the root
    #[must_use]
    pub fn with_file(self, relative: &str, text: &str) -> Self {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, text).unwrap();
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn host_config() -> HostConfig {
        HostConfig::new().with_alias(CORE_ALIAS, CORE_DIR)
    }

    pub fn open(&self) -> Project {
        Project::open(self.root(), Self::host_config()).unwrap()
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap()
    }
}

impl Default for FixtureProject {
    fn default() -> Self {
        Self::new()
    }
}

/// The legacy store: products (complete), orders (loop-dispatch reducer)
/// and a page dispatching product actions
pub fn legacy_project() -> FixtureProject {
    FixtureProject::new()
        .with_file(fixtures::PRODUCTS_ACTIONS_PATH, fixtures::PRODUCTS_ACTIONS)
        .with_file(fixtures::PRODUCTS_REDUCER_PATH, fixtures::PRODUCTS_REDUCER)
        .with_file(fixtures::PRODUCTS_EFFECTS_PATH, fixtures::PRODUCTS_EFFECTS)
        .with_file(fixtures::ORDERS_ACTIONS_PATH, fixtures::ORDERS_ACTIONS)
        .with_file(fixtures::ORDERS_REDUCER_PATH, fixtures::ORDERS_REDUCER)
        .with_file(fixtures::PRODUCT_PAGE_PATH, fixtures::PRODUCT_PAGE)
}

pub mod fixtures {
    pub const PRODUCTS_ACTIONS_PATH: &str = "src/app/core/store/shopping/products/products.actions.ts";
    pub const PRODUCTS_REDUCER_PATH: &str = "src/app/core/store/shopping/products/products.reducer.ts";
    pub const PRODUCTS_EFFECTS_PATH: &str = "src/app/core/store/shopping/products/products.effects.ts";
    pub const ORDERS_ACTIONS_PATH: &str = "src/app/core/store/checkout/orders/orders.actions.ts";
    pub const ORDERS_REDUCER_PATH: &str = "src/app/core/store/checkout/orders/orders.reducer.ts";
    pub const PRODUCT_PAGE_PATH: &str = "src/app/pages/product/product-page.component.ts";

    pub const PRODUCTS_ACTIONS: &str = r"import { Action } from '@ngrx/store';

import { HttpError } from 'ish-core/models/http-error/http-error.model';
import { Product } from 'ish-core/models/product/product.model';

export enum ProductsActionTypes {
  LoadProduct = '[Shopping] Load Product',
  LoadProductsByCategory = '[Shopping] Load Products By Category',
  LoadProductFail = '[Shopping] Load Product Fail',
  LoadProductSuccess = '[Shopping] Load Product Success',
  ResetProducts = '[Shopping] Reset Products',
}

export class LoadProduct implements Action {
  readonly type = ProductsActionTypes.LoadProduct;
  constructor(public payload: { sku: string }) {}
}

export class LoadProductsByCategory implements Action {
  readonly type = ProductsActionTypes.LoadProductsByCategory;
  constructor(public payload: { categoryId: string }) {}
}

/** loading a product failed */
export class LoadProductFail implements Action {
  readonly type = ProductsActionTypes.LoadProductFail;
  constructor(public payload: { error: HttpError }) {}
}

export class LoadProductSuccess implements Action {
  readonly type = ProductsActionTypes.LoadProductSuccess;
  constructor(public payload: { product: Product }) {}
}

export class ResetProducts implements Action {
  readonly type = ProductsActionTypes.ResetProducts;
}

export type ProductsAction =
  | LoadProduct
  | LoadProductsByCategory
  | LoadProductFail
  | LoadProductSuccess
  | ResetProducts;
";

    pub const PRODUCTS_REDUCER: &str = r"import { Product } from 'ish-core/models/product/product.model';

import { ProductsAction, ProductsActionTypes } from './products.actions';

export interface ProductsState {
  products: Product[];
  loading: boolean;
  failed: string[];
}

export const initialState: ProductsState = {
  products: [],
  loading: false,
  failed: [],
};

export function productsReducer(state = initialState, action: ProductsAction): ProductsState {
  switch (action.type) {
    case ProductsActionTypes.LoadProduct:
    case ProductsActionTypes.LoadProductsByCategory:
    case ProductsActionTypes.ResetProducts: {
      return { ...state, loading: true };
    }
    case ProductsActionTypes.LoadProductFail: {
      return { ...state, loading: false, failed: [...state.failed, action.payload.error.message] };
    }
    case ProductsActionTypes.LoadProductSuccess: {
      const { product } = action.payload;
      return {
        ...state,
        products: [...state.products.filter(p => p.sku !== product.sku), product],
        loading: false,
      };
    }
  }
  return state;
}
";

    pub const PRODUCTS_EFFECTS: &str = r"import { Injectable } from '@angular/core';
import { Actions, Effect, ofType } from '@ngrx/effects';
import { iif, of } from 'rxjs';
import { concatMap, map, mergeMap } from 'rxjs/operators';

import { ProductsService } from 'ish-core/services/products/products.service';
import { mapErrorToAction } from 'ish-core/utils/operators';

import { LoadProduct, LoadProductFail, LoadProductSuccess, ProductsActionTypes } from './products.actions';

@Injectable()
export class ProductsEffects {
  constructor(private actions$: Actions, private productsService: ProductsService) {}

  @Effect()
  loadProduct$ = this.actions$.pipe(
    ofType<LoadProduct>(ProductsActionTypes.LoadProduct),
    map(action => action.payload.sku),
    concatMap(sku =>
      this.productsService.getProduct(sku).pipe(
        map(product => new LoadProductSuccess({ product })),
        mapErrorToAction(LoadProductFail)
      )
    )
  );

  @Effect({ dispatch: false })
  logFailures$ = this.actions$.pipe(
    ofType(ProductsActionTypes.LoadProductFail),
    mergeMap(() => iif(() => this.productsService.verbose, of(true), of(false)))
  );
}
";

    pub const ORDERS_ACTIONS: &str = r"import { Action } from '@ngrx/store';

export enum OrdersActionTypes {
  LoadOrders = '[Checkout] Load Orders',
}

export class LoadOrders implements Action {
  readonly type = OrdersActionTypes.LoadOrders;
}

export type OrdersAction = LoadOrders;
";

    pub const ORDERS_REDUCER: &str = r"import { OrdersAction } from './orders.actions';

export interface OrdersState {
  loading: boolean;
}

export const initialState: OrdersState = { loading: false };

const handlers = [];

export function ordersReducer(state = initialState, action: OrdersAction): OrdersState {
  for (const handler of handlers) {
    if (handler.type === action.type) {
      return handler.reduce(state, action);
    }
  }
  return state;
}
";

    pub const PRODUCT_PAGE: &str = r"import { Component } from '@angular/core';
import { Store } from '@ngrx/store';

import { LoadProduct, LoadProductFail } from 'ish-core/store/shopping/products/products.actions';

@Component({ selector: 'ish-product-page', templateUrl: './product-page.component.html' })
export class ProductPageComponent {
  constructor(private store: Store<{}>) {}

  load(sku: string) {
    this.store.dispatch(new LoadProduct({ sku }));
  }

  fail(error: HttpError) {
    this.store.dispatch(new LoadProductFail({ error }));
  }
}
";
}
