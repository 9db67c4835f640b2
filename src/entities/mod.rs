//! Sea-ORM entities for the branch ledger.

pub mod branch;
pub mod category;
pub mod container_stock;
pub mod customer;
pub mod customer_payment;
pub mod product;
pub mod returnable_container;
pub mod sale;
pub mod sale_line;
pub mod sales_forecast;
pub mod shift_close;
pub mod stock_lot;
pub mod supplier;
pub mod supplier_invoice;
pub mod supplier_payment;

pub use stock_lot::StockLocation;
pub use sale::PaymentMethod;
pub use sale_line::SaleLineKind;
