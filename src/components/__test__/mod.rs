mod patches_test;
