/// Alias for `format!()`
#[macro_export]
macro_rules! fmt {
    ($($arg:tt)*) => {
        format!($($arg)*)
    };
}
