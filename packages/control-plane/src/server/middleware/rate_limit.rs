// Rate limiting middleware using tower-governor
//
// Configuration:
// - 10 requests/sec per IP, burst of 20
// - Prevents abuse of the job admission and dispatch endpoints
//
// Applied in app.rs as a layer on the protected router.
