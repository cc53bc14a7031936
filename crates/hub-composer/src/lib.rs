//! C7: the Composition Executor — declarative multi-step tool workflows
//! with parameter references, conditions, and LIFO rollback.

mod condition;
mod executor;
mod model;
mod resolve;
mod validate;

pub use executor::{execute, execute_checked, validate_params, Composer};
pub use model::{
    Condition, ConditionType, ComposedResult, ComposedTool, InputValue, ParamRef, RollbackInfo,
    RollbackSpec, Step, StepResult, StepStatus,
};
