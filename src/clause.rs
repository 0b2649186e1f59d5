//! WHERE/HAVING compilation plus the GROUP BY/ORDER BY formatters.

pub mod compiler;
pub mod condition;
pub mod modifiers;
pub mod params;

pub use compiler::{Clause, ClauseCompiler, ClauseKind, Escaper, StandardEscaper};
pub use condition::{Combiner, Condition, Operand, Operator, Triple};
pub use modifiers::{Direction, group_by, order_by};
pub use params::ParameterStore;
