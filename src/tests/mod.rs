mod runtime;

mod test_rate_limiter;
