mod lazy_table;

pub use lazy_table::{LazyTable, PickerEvent};
