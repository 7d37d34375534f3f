use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject
/// dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// `crate::model::memory::MemoryBackend`, both sharing the same in-memory
/// state. Passing `voter` as an argument seeds a verified voter and logs the
/// client in as them before the test starts.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the arguments to inject and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client as a voter if needed.
    let maybe_login = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "voter" => quote! {
            let user = crate::model::store::UserStore::insert(
                backend.users.as_ref(),
                crate::model::common::user::NewUser::example(),
            )
            .await
            .unwrap();
            backend
                .profiles
                .insert(crate::model::common::profile::NewProfile::example_with_face(user.id))
                .unwrap();

            let response = rocket_client
                .post("/api/v1/auth/login")
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(crate::model::api::auth::LoginRequest::example()).to_string())
                .dispatch()
                .await;
            let login: crate::model::api::auth::LoginResponse = response.into_json().await.unwrap();

            let message = backend.outbox.last_to(&user.email).unwrap().message;
            let code = &message[message.len() - crate::model::otp::CODE_LENGTH..];
            let verify = crate::model::api::auth::VerifyMfaRequest {
                mfa_token: login.mfa_token,
                mfa_code: code.to_string(),
            };
            let response = rocket_client
                .post("/api/v1/auth/verify-mfa")
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(verify).to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), rocket::http::Status::Ok);
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `voter` or nothing")
                .into_compile_error()
                .into();
        }
        None => quote! {},
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, crate::model::memory::MemoryBackend) {
                let backend = crate::model::memory::MemoryBackend::new();
                let rocket = crate::rocket_for_backend(
                    crate::Config::example(),
                    backend.stores(),
                    backend.collaborators(),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                {
                    #maybe_login
                }

                (rocket_client, backend)
            }

            /// The test itself.
            #item_fn

            // Tests enter backend code, so enable logging.
            log4rs_test_utils::test_logging::init_logging_once_for(["evote_backend"], None, None);

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, backend) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_backend = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "MemoryBackend" {
                            if has_backend {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `MemoryBackend`",
                                ));
                            }
                            has_backend = true;
                            args.push(quote! { backend });
                            continue;
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `backend_ident: MemoryBackend`",
        ));
    }

    Ok(args)
}

/// Transform an asynchronous test into a synchronous one that runs against a
/// fresh MongoDB database, injected as [`mongodb::Database`].
///
/// The database lives on the server named by `ROCKET_DB_URI`, gets the
/// backend's indexes, and is dropped WHETHER OR NOT the test completes by
/// passing, failing or otherwise panicking. A panic is "rethrown" once the
/// database is gone. Without `ROCKET_DB_URI` the test logs a warning and
/// passes without running.
#[proc_macro_attribute]
pub fn db_test(_: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    if let Err(err) = check_db_sig(item_fn.sig.clone()) {
        return err.into_compile_error().into();
    }

    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    quote! {
        #[test]
        fn #name() {
            /// The test itself.
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(["evote_backend"], None, None);

            let Ok(db_uri) = std::env::var("ROCKET_DB_URI") else {
                log::warn!("ROCKET_DB_URI not set, skipping {}", stringify!(#name));
                return;
            };

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            let db = runtime.block_on(async {
                let client = ::mongodb::Client::with_uri_str(&db_uri).await.unwrap();
                let db = client.database(&format!("evote_test_{}", crate::model::mongodb::Id::new()));
                crate::model::mongodb::ensure_indexes_exist(&db).await.unwrap();
                db
            });

            // The runtime and the future are not `UnwindSafe`, but nothing
            // they hold is looked at again after a panic except to drop the
            // database.
            let test_db = db.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                runtime.block_on(#new_name(test_db));
            }));

            runtime.block_on(db.drop(None)).unwrap();

            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async and takes exactly one `Database`.
fn check_db_sig(sig: Signature) -> Result<(), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let inputs = &sig.inputs;
    if inputs.len() != 1 {
        return Err(syn::Error::new(
            inputs.span(),
            "The tagged function must accept exactly one `mongodb::Database`",
        ));
    }

    for input in inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if type_path.path.get_ident().map_or(false, |ident| ident == "Database") {
                    continue;
                }
            }
        }
        return Err(syn::Error::new(
            input.span(),
            "Expected `db_ident: Database`",
        ));
    }

    Ok(())
}
