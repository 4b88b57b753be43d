mod agent_loop;
mod search_roundtrip;
