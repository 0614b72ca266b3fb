//! # Customer Repository
//!
//! Loyalty points and credit due. Both balances are optional columns; on
//! databases without them the balance statements are skipped.

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{push_store_scope, read_adaptive};
use crate::error::DbResult;
use crate::schema::SchemaCatalog;
use tally_core::schema::columns;
use tally_core::{CoreError, Customer, SchemaCapabilities};

fn customer_columns(caps: &SchemaCapabilities) -> String {
    let mut cols = String::from("id, store_id, name, phone, created_at");
    if caps.supports(columns::CUSTOMERS_LOYALTY_POINTS) {
        cols.push_str(", loyalty_points");
    }
    if caps.supports(columns::CUSTOMERS_CREDIT_DUE) {
        cols.push_str(", credit_due");
    }
    cols
}

/// Repository for customers.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: PgPool,
    catalog: Arc<SchemaCatalog>,
}

impl CustomerRepository {
    pub fn new(pool: PgPool, catalog: Arc<SchemaCatalog>) -> Self {
        CustomerRepository { pool, catalog }
    }

    pub async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Customer>> {
        let rows: Vec<Customer> = read_adaptive(&self.pool, &self.catalog, "get_customer", |caps| {
            let mut qb = QueryBuilder::new("SELECT ");
            qb.push(customer_columns(caps));
            qb.push(" FROM customers WHERE id = ");
            qb.push_bind(id);
            Some(qb)
        })
        .await?;
        Ok(rows.into_iter().next())
    }

    /// Creates a customer with zero balances.
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        store_id: Option<Uuid>,
        name: &str,
        phone: Option<&str>,
    ) -> DbResult<Customer> {
        let id = Uuid::new_v4();
        let name = name.trim().to_string();
        let phone = phone.map(|p| p.trim().to_string());
        debug!(id = %id, "Inserting customer");

        let rows: Vec<Customer> = self
            .catalog
            .fetch_all_adaptive(conn, "insert_customer", |caps| {
                let mut qb =
                    QueryBuilder::new("INSERT INTO customers (id, store_id, name, phone) VALUES (");
                let mut values = qb.separated(", ");
                values.push_bind(id);
                values.push_bind(store_id);
                values.push_bind(name.clone());
                values.push_bind(phone.clone());
                qb.push(") RETURNING ");
                qb.push(customer_columns(caps));
                Some(qb)
            })
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()).into())
    }

    /// Locks a customer row, scoped to `store_id`.
    pub async fn lock(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        store_id: Option<Uuid>,
    ) -> DbResult<Customer> {
        let rows: Vec<Customer> = self
            .catalog
            .fetch_all_adaptive(conn, "lock_customer", |caps| {
                let mut qb = QueryBuilder::new("SELECT ");
                qb.push(customer_columns(caps));
                qb.push(" FROM customers WHERE id = ");
                qb.push_bind(id);
                qb.push(" AND ");
                push_store_scope(&mut qb, "store_id", store_id);
                qb.push(" FOR UPDATE");
                Some(qb)
            })
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()).into())
    }

    /// Deducts `points` only if the balance covers them. Returns whether
    /// the deduction happened.
    pub async fn spend_points(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        points: i64,
    ) -> DbResult<bool> {
        let affected = self
            .catalog
            .execute_adaptive(conn, "spend_loyalty_points", |caps| {
                if !caps.supports(columns::CUSTOMERS_LOYALTY_POINTS) {
                    return None;
                }
                let mut qb = QueryBuilder::new(
                    "UPDATE customers SET loyalty_points = loyalty_points - ",
                );
                qb.push_bind(points);
                qb.push(" WHERE id = ");
                qb.push_bind(id);
                qb.push(" AND loyalty_points >= ");
                qb.push_bind(points);
                Some(qb)
            })
            .await?;
        Ok(affected == 1)
    }

    pub async fn award_points(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        points: i64,
    ) -> DbResult<()> {
        self.catalog
            .execute_adaptive(conn, "award_loyalty_points", |caps| {
                if !caps.supports(columns::CUSTOMERS_LOYALTY_POINTS) {
                    return None;
                }
                let mut qb = QueryBuilder::new(
                    "UPDATE customers SET loyalty_points = loyalty_points + ",
                );
                qb.push_bind(points);
                qb.push(" WHERE id = ");
                qb.push_bind(id);
                Some(qb)
            })
            .await?;
        Ok(())
    }

    /// Adds to the customer's credit due. Returns whether it was recorded.
    pub async fn add_credit(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        amount: Decimal,
    ) -> DbResult<bool> {
        let affected = self
            .catalog
            .execute_adaptive(conn, "add_credit_due", |caps| {
                if !caps.supports(columns::CUSTOMERS_CREDIT_DUE) {
                    return None;
                }
                let mut qb = QueryBuilder::new("UPDATE customers SET credit_due = credit_due + ");
                qb.push_bind(amount);
                qb.push(" WHERE id = ");
                qb.push_bind(id);
                Some(qb)
            })
            .await?;
        Ok(affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_columns_follow_capabilities() {
        assert_eq!(
            customer_columns(&SchemaCapabilities::empty()),
            "id, store_id, name, phone, created_at"
        );
        let caps = SchemaCapabilities::from_columns(
            1,
            [("customers", "loyalty_points"), ("customers", "credit_due")],
        );
        assert!(customer_columns(&caps).ends_with("loyalty_points, credit_due"));
    }
}
