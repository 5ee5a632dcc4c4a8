mod money;
mod month;
mod record;
mod student;
mod validation;

pub use money::*;
pub use month::*;
pub use record::*;
pub use student::*;
pub use validation::*;
