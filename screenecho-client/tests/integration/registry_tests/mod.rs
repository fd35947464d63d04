mod test_remote_stream_events;
