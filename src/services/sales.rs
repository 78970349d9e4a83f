//! Read side of the sale ledger: seller-scoped sale and line lookups.

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::UnitOfWork;
use crate::entities::{
    item_sale::{self, Entity as ItemSaleEntity},
    sale::{self, Entity as SaleEntity},
};
use crate::errors::ServiceError;

/// A sale plus its batch-attributed lines.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SaleWithLines {
    #[schema(value_type = Object)]
    pub sale: sale::Model,
    #[schema(value_type = Vec<Object>)]
    pub item_sales: Vec<item_sale::Model>,
}

#[derive(Clone)]
pub struct SaleService {
    uow: UnitOfWork,
}

impl SaleService {
    pub fn new(uow: UnitOfWork) -> Self {
        Self { uow }
    }

    #[instrument(skip(self))]
    pub async fn get_sale(
        &self,
        seller_id: Uuid,
        sale_id: Uuid,
    ) -> Result<SaleWithLines, ServiceError> {
        let conn = self.uow.connection();

        let sale = SaleEntity::find_by_id(sale_id)
            .filter(sale::Column::SellerId.eq(seller_id))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))?;

        let item_sales = ItemSaleEntity::find()
            .filter(item_sale::Column::SaleId.eq(sale_id))
            .order_by_asc(item_sale::Column::CreatedAt)
            .all(conn)
            .await?;

        Ok(SaleWithLines { sale, item_sales })
    }

    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        seller_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<sale::Model>, u64), ServiceError> {
        let paginator = SaleEntity::find()
            .filter(sale::Column::SellerId.eq(seller_id))
            .order_by_desc(sale::Column::CreatedAt)
            .paginate(self.uow.connection(), limit);

        let total = paginator.num_items().await?;
        let sales = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((sales, total))
    }
}
