//! MySQL dialect implementation.

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn force_quote(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }
}
