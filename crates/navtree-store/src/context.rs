/// Who is exploring what: passed explicitly into every session operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub product: String,
    pub product_version: Option<String>,
    pub tester: Option<String>,
}

impl SessionContext {
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            product_version: None,
            tester: None,
        }
    }

    pub fn with_product_version(mut self, version: impl Into<String>) -> Self {
        self.product_version = Some(version.into());
        self
    }

    pub fn with_tester(mut self, tester: impl Into<String>) -> Self {
        self.tester = Some(tester.into());
        self
    }
}
