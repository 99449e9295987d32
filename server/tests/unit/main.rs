mod common;
mod test_api;
mod test_fsm;
mod test_orchestrator;
mod test_postgres;
