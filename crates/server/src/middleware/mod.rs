mod model_loaders;

pub use model_loaders::{load_decision_middleware, load_task_middleware};
