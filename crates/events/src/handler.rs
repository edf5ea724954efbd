/// Decide and evolve in one step, without persistence or publication.
///
/// Calls `aggregate.handle(command)` and applies every returned event in order.
/// On error the aggregate is left untouched. Useful in unit tests and anywhere an
/// aggregate is driven in memory; the infra `CommandDispatcher` runs the same two
/// steps around an event store append.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: larder_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
