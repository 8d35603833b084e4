use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::mirror::{Environment, TableMirror};

/// Placeholder for converting previously LINKED tables; plans nothing.
pub struct ConvertLinkedStrategy;

impl StrategyHandler for ConvertLinkedStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::ConvertLinked
    }

    fn build_definition(&self, _ctx: &StrategyContext, _mirror: &mut TableMirror) -> bool {
        true
    }

    fn build_sql(&self, _ctx: &StrategyContext, _mirror: &mut TableMirror) -> bool {
        true
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        Vec::new()
    }
}
